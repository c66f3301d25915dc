use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Mutable per-alert bookkeeping, persisted between evaluations.
///
/// Only the engine writes this, under the alert's lock.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub trigger_count: u64,
    pub alerts_today: u32,
    pub alerts_today_date: Option<NaiveDate>,
    pub consecutive_anomaly_count: u32,
    pub last_value: Option<f64>,
    pub last_baseline: Option<f64>,
    pub last_score: Option<f64>,
}

impl AlertState {
    /// Whether a scheduled pass at `now` should evaluate this alert again.
    pub fn is_due(&self, check_frequency: Duration, now: DateTime<Utc>) -> bool {
        self.last_checked_at
            .is_none_or(|checked| now - checked >= check_frequency)
    }

    /// Zero the daily counter when `today` is a new calendar day.
    pub fn roll_day(&mut self, today: NaiveDate) {
        if self.alerts_today_date != Some(today) {
            self.alerts_today = 0;
            self.alerts_today_date = Some(today);
        }
    }
}
