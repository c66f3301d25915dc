//! Structural validation of alert definitions.
//!
//! Serde rejects unknown fields and algorithm names at parse time; these
//! checks cover value ranges and cross-field consistency. Errors block
//! evaluation, warnings are advisory.

use serde::{Deserialize, Serialize};

use mailpulse_core::EngineError;

use super::{AlertDefinition, AlertKind, AnomalyAlgorithm, MetricKind, SemanticAlgorithm};
use mailpulse_compute::{DbscanParams, KmeansParams};

// ── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// A single finding, located by a dotted path such as `kind.algorithm.k`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    /// All errors as one `path: message; ...` line.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// ── Public API ──────────────────────────────────────────────────────

impl AlertDefinition {
    /// Run every check and collect the findings.
    pub fn check(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        check_identity(self, &mut result);
        check_window(self, &mut result);
        check_cooldown(self, &mut result);
        check_kind(self, &mut result);
        result
    }

    /// Fail with [`EngineError::InvalidConfiguration`] on any error.
    pub fn validate(&self) -> Result<(), EngineError> {
        let result = self.check();
        if result.is_valid() {
            Ok(())
        } else {
            Err(EngineError::invalid(&self.id, result.error_summary()))
        }
    }
}

// ── Limits ──────────────────────────────────────────────────────────

/// Longest evaluation window, in days.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Deepest baseline. Statistical alerts issue one store query per day.
pub const MAX_BASELINE_DAYS: u32 = 365;

// ── Checks ──────────────────────────────────────────────────────────

fn check_identity(def: &AlertDefinition, result: &mut ValidationResult) {
    if def.id.trim().is_empty() {
        result.error("id", "id must not be empty");
    }
    if def.name.trim().is_empty() {
        result.error("name", "name must not be empty");
    }
}

fn check_window(def: &AlertDefinition, result: &mut ValidationResult) {
    let window = &def.window;
    if window.size == 0 {
        result.error("window.size", "window size must be at least 1");
    }
    if window.minutes() > MAX_WINDOW_DAYS * 1440 {
        result.error(
            "window.size",
            format!("window must not exceed {MAX_WINDOW_DAYS} days"),
        );
    }
    if window.check_frequency_minutes == 0 {
        result.error(
            "window.check_frequency_minutes",
            "check frequency must be at least 1 minute",
        );
    }
    if window.baseline_days == 0 {
        result.error("window.baseline_days", "baseline must cover at least 1 day");
    }
    if window.baseline_days > MAX_BASELINE_DAYS {
        result.error(
            "window.baseline_days",
            format!("baseline must not exceed {MAX_BASELINE_DAYS} days"),
        );
    }

    if def.metric == MetricKind::KeywordMatches && def.filter.keywords.is_empty() {
        result.error(
            "filter.keywords",
            "keyword_matches metric needs at least one keyword",
        );
    }
    if def.metric == MetricKind::EntityMentions && !def.filter.has_entity_predicate() {
        result.warn(
            "filter",
            "entity_mentions without entity_type/entity_value counts every entity",
        );
    }
}

fn check_cooldown(def: &AlertDefinition, result: &mut ValidationResult) {
    let cooldown = &def.cooldown;
    if cooldown.consecutive_anomalies == 0 {
        result.error(
            "cooldown.consecutive_anomalies",
            "consecutive_anomalies must be at least 1",
        );
    }
    if cooldown.enabled && cooldown.max_alerts_per_day == 0 {
        result.error(
            "cooldown.max_alerts_per_day",
            "max_alerts_per_day of 0 would suppress every trigger",
        );
    }
}

fn check_kind(def: &AlertDefinition, result: &mut ValidationResult) {
    match &def.kind {
        AlertKind::Static { value, .. } => {
            if !value.is_finite() {
                result.error("kind.value", "threshold value must be finite");
            }
        }
        AlertKind::Anomaly { algorithm } => check_algorithm(algorithm, result),
        AlertKind::SemanticMatch {
            query,
            similarity_threshold,
            algorithm,
            ..
        } => {
            if query.trim().is_empty() {
                result.error("kind.query", "semantic query must not be empty");
            }
            if !(0.0..=1.0).contains(similarity_threshold) {
                result.error(
                    "kind.similarity_threshold",
                    format!("similarity_threshold must be within [0, 1], got {similarity_threshold}"),
                );
            }
            match algorithm {
                SemanticAlgorithm::Dbscan(p) => check_dbscan(p, result),
                SemanticAlgorithm::Kmeans(p) => check_kmeans(p, result),
            }
            if def.filter != Default::default() {
                result.warn("filter", "filters are ignored for semantic_match alerts");
            }
        }
    }
}

fn check_algorithm(algorithm: &AnomalyAlgorithm, result: &mut ValidationResult) {
    match algorithm {
        AnomalyAlgorithm::Zscore(p) => {
            if !(p.threshold > 0.0) {
                result.error("kind.algorithm.threshold", "z-score threshold must be positive");
            }
        }
        AnomalyAlgorithm::Ewma(p) => {
            if !(p.span >= 1.0) {
                result.error("kind.algorithm.span", "EWMA span must be at least 1");
            }
            if !(p.effective_threshold() > 0.0) {
                result.error("kind.algorithm.threshold", "EWMA threshold must be positive");
            }
        }
        AnomalyAlgorithm::PercentageChange(p) => {
            if !(p.threshold > 0.0) {
                result.error(
                    "kind.algorithm.threshold",
                    "percentage threshold must be positive",
                );
            }
        }
        AnomalyAlgorithm::Dbscan(p) => check_dbscan(p, result),
        AnomalyAlgorithm::Kmeans(p) => check_kmeans(p, result),
    }
}

fn check_dbscan(params: &DbscanParams, result: &mut ValidationResult) {
    if !(params.eps > 0.0) {
        result.error("kind.algorithm.eps", "eps must be positive");
    }
    if params.min_samples == 0 {
        result.error("kind.algorithm.min_samples", "min_samples must be at least 1");
    }
}

fn check_kmeans(params: &KmeansParams, result: &mut ValidationResult) {
    if params.k == 0 {
        result.error("kind.algorithm.k", "k must be at least 1");
    }
    if !(0.0..=100.0).contains(&params.percentile) {
        result.error(
            "kind.algorithm.percentile",
            format!("percentile must be within [0, 100], got {}", params.percentile),
        );
    }
}
