//! Evaluation outputs shared between the engine, its storage and the
//! notification side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Contributor;

pub type AlertId = String;
pub type HistoryId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Terminal state of one evaluation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Triggered,
    NotTriggered,
    Suppressed,
}

/// Post-hoc label for an anomalous point relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    Spike,
    Silence,
    UnusualPattern,
}

impl AnomalyType {
    /// `spike` above 1.5x baseline, `silence` below 0.3x, otherwise `unusual_pattern`.
    pub fn classify(value: f64, baseline: f64) -> Self {
        if value > baseline * 1.5 {
            AnomalyType::Spike
        } else if value < baseline * 0.3 {
            AnomalyType::Silence
        } else {
            AnomalyType::UnusualPattern
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnomalyType::Spike => write!(f, "spike"),
            AnomalyType::Silence => write!(f, "silence"),
            AnomalyType::UnusualPattern => write!(f, "unusual_pattern"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    #[serde(default)]
    pub is_anomaly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_type: Option<AnomalyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
}

impl TimeSeriesPoint {
    pub fn plain(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            is_anomaly: false,
            anomaly_type: None,
            anomaly_score: None,
        }
    }
}

/// Result of evaluating one alert definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub alert_id: AlertId,
    pub verdict: Verdict,
    pub triggered: bool,
    pub reason: Option<String>,
    pub current_value: f64,
    pub baseline_value: f64,
    /// Z-score, relative deviation, or clustering distance/noise fraction.
    pub score: Option<f64>,
    pub percentage_change: Option<f64>,
    pub time_series: Vec<TimeSeriesPoint>,
    pub in_cooldown: bool,
    pub cooldown_remaining_minutes: Option<i64>,
    pub top_contributors: Vec<Contributor>,
    pub evaluated_at: DateTime<Utc>,
    /// Set when the gate approved the trigger and a history record was written.
    pub history_id: Option<HistoryId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    /// No channel was configured for the alert.
    Skipped,
    Failed { error: String },
}

impl NotificationStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, NotificationStatus::Failed { .. })
    }
}

/// Append-only record written whenever a trigger passes the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerHistoryRecord {
    pub id: HistoryId,
    pub alert_id: AlertId,
    pub triggered_at: DateTime<Utc>,
    pub metric_value: f64,
    pub baseline_value: f64,
    pub score: Option<f64>,
    #[serde(default)]
    pub percentage_change: Option<f64>,
    pub reason: String,
    pub top_contributors: Vec<Contributor>,
    pub time_series_snapshot: Vec<TimeSeriesPoint>,
    pub notification_status: NotificationStatus,
}

impl TriggerHistoryRecord {
    /// Build a record from an approved evaluation, keeping the last
    /// `snapshot_points` points of its time series.
    pub fn from_result(result: &EvaluationResult, snapshot_points: usize) -> Self {
        let skip = result.time_series.len().saturating_sub(snapshot_points);
        Self {
            id: Uuid::new_v4(),
            alert_id: result.alert_id.clone(),
            triggered_at: result.evaluated_at,
            metric_value: result.current_value,
            baseline_value: result.baseline_value,
            score: result.score,
            percentage_change: result.percentage_change,
            reason: result.reason.clone().unwrap_or_default(),
            top_contributors: result.top_contributors.clone(),
            time_series_snapshot: result.time_series[skip..].to_vec(),
            notification_status: NotificationStatus::Pending,
        }
    }
}

/// What the notification side needs to know about the alert itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSummary {
    pub id: AlertId,
    pub name: String,
    pub description: Option<String>,
    pub severity: Severity,
    /// Kind tag: `static`, `anomaly` or `semantic_match`.
    pub kind: String,
    pub metric: String,
}
