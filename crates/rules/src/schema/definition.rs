//! Alert definition root type: metric, window, cooldown and severity.

use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use mailpulse_core::{AlertId, AlertSummary, ContributorKey, EventFilter, Severity};

use super::AlertKind;

/// Top-level alert definition parsed from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AlertDefinition {
    pub id: AlertId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metric: MetricKind,
    #[serde(default)]
    pub filter: EventFilter,
    #[serde(default)]
    pub window: TimeWindow,
    pub kind: AlertKind,
    #[serde(default)]
    pub cooldown: CooldownSpec,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AlertDefinition {
    /// What the notification side gets to see about this alert.
    pub fn summary(&self) -> AlertSummary {
        AlertSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            severity: self.severity,
            kind: self.kind.label().to_string(),
            metric: self.metric.to_string(),
        }
    }
}

// ── Metric ───────────────────────────────────────────────────────────

/// Quantity measured over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Number of matching emails.
    #[default]
    EmailVolume,
    /// Number of distinct senders among matching emails.
    UniqueSenders,
    /// Number of entity mentions matching the filter's entity predicate.
    EntityMentions,
    /// Number of emails whose subject contains one of the filter keywords.
    KeywordMatches,
}

impl MetricKind {
    /// Grouping used for the top-contributors breakdown.
    pub fn contributor_key(self) -> ContributorKey {
        match self {
            MetricKind::EntityMentions => ContributorKey::Entity,
            _ => ContributorKey::Sender,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::EmailVolume => write!(f, "email_volume"),
            MetricKind::UniqueSenders => write!(f, "unique_senders"),
            MetricKind::EntityMentions => write!(f, "entity_mentions"),
            MetricKind::KeywordMatches => write!(f, "keyword_matches"),
        }
    }
}

// ── Window ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowUnit {
    Minutes,
    Hours,
    #[default]
    Days,
}

/// Evaluation window, check cadence and baseline depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWindow {
    #[serde(default = "default_window_size")]
    pub size: u32,
    #[serde(default)]
    pub unit: WindowUnit,
    #[serde(default = "default_check_frequency")]
    pub check_frequency_minutes: u32,
    #[serde(default = "default_baseline_days")]
    pub baseline_days: u32,
}

impl TimeWindow {
    pub fn minutes(&self) -> i64 {
        let size = i64::from(self.size);
        match self.unit {
            WindowUnit::Minutes => size,
            WindowUnit::Hours => size * 60,
            WindowUnit::Days => size * 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    pub fn check_frequency(&self) -> Duration {
        Duration::minutes(i64::from(self.check_frequency_minutes))
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self {
            size: default_window_size(),
            unit: WindowUnit::Days,
            check_frequency_minutes: default_check_frequency(),
            baseline_days: default_baseline_days(),
        }
    }
}

// ── Cooldown ─────────────────────────────────────────────────────────

/// Anti-spam settings applied after an anomaly is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CooldownSpec {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,
    #[serde(default = "default_max_alerts_per_day")]
    pub max_alerts_per_day: u32,
    /// Anomalous evaluations in a row needed before a trigger.
    #[serde(default = "default_consecutive")]
    pub consecutive_anomalies: u32,
}

impl Default for CooldownSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_minutes: default_cooldown_minutes(),
            max_alerts_per_day: default_max_alerts_per_day(),
            consecutive_anomalies: default_consecutive(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_window_size() -> u32 {
    1
}

fn default_check_frequency() -> u32 {
    5
}

fn default_baseline_days() -> u32 {
    7
}

fn default_cooldown_minutes() -> u32 {
    60
}

fn default_max_alerts_per_day() -> u32 {
    10
}

fn default_consecutive() -> u32 {
    1
}
