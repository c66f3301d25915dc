use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env_opt(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key).map(|v| v.to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub evaluation: EvaluationConfig,
    pub sources: SourceConfig,
}

impl EngineConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    pub fn from_env() -> Self {
        Self {
            scheduler: SchedulerConfig::from_env(),
            evaluation: EvaluationConfig::from_env(),
            sources: SourceConfig::from_env(),
        }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  scheduler:   enabled={}, interval={}s, max_concurrency={}",
            self.scheduler.enabled,
            self.scheduler.check_interval_secs,
            self.scheduler.max_concurrency
        );
        tracing::info!(
            "  evaluation:  top_contributors={}, trend_days={}, snapshot_points={}",
            self.evaluation.top_contributors,
            self.evaluation.trend_days,
            self.evaluation.history_snapshot_points
        );
        tracing::info!(
            "  sources:     alerts_dir={}, events_file={}",
            self.sources.alerts_dir.display(),
            self.sources.events_file.display()
        );
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between scheduled evaluation passes.
    pub check_interval_secs: u64,
    /// Alerts evaluated concurrently within one pass.
    pub max_concurrency: usize,
}

impl SchedulerConfig {
    fn from_env() -> Self {
        Self {
            enabled: env_bool("ALERT_SCHEDULER_ENABLED", true),
            check_interval_secs: env_u64("ALERT_CHECK_INTERVAL_SECS", 300).max(1),
            max_concurrency: env_usize("ALERT_MAX_CONCURRENCY", 4).max(1),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: 300,
            max_concurrency: 4,
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────

/// Upper bound on the trend chart lookback.
const MAX_TREND_DAYS: u64 = 3650;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub top_contributors: usize,
    pub trend_days: i64,
    pub history_snapshot_points: usize,
}

impl EvaluationConfig {
    fn from_env() -> Self {
        Self {
            top_contributors: env_usize("ALERT_TOP_CONTRIBUTORS", 5),
            trend_days: env_u64("ALERT_TREND_DAYS", 7).clamp(1, MAX_TREND_DAYS) as i64,
            history_snapshot_points: env_usize("ALERT_HISTORY_SNAPSHOT_POINTS", 24),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            top_contributors: 5,
            trend_days: 7,
            history_snapshot_points: 24,
        }
    }
}

// ── Sources ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub alerts_dir: PathBuf,
    pub events_file: PathBuf,
}

impl SourceConfig {
    fn from_env() -> Self {
        Self {
            alerts_dir: PathBuf::from(env_or("ALERTS_DIR", "data/alerts")),
            events_file: PathBuf::from(env_or("EVENTS_FILE", "data/events.jsonl")),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            alerts_dir: PathBuf::from("data/alerts"),
            events_file: PathBuf::from("data/events.jsonl"),
        }
    }
}
