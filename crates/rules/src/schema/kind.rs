//! Alert kinds: static threshold, anomaly detection, semantic match.

use std::fmt;

use serde::{Deserialize, Serialize};

use mailpulse_compute::baseline::{
    EwmaParams, PercentageChangeParams, StatisticalAlgorithm, ZscoreParams,
};
use mailpulse_compute::{ClusteringAlgorithm, DbscanParams, KmeansParams};

/// How an alert decides that the current window is anomalous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertKind {
    /// Compare the metric against a fixed value.
    Static {
        #[serde(default)]
        operator: StaticOperator,
        #[serde(default = "default_static_value")]
        value: f64,
    },
    /// Compare the metric against its own history.
    Anomaly { algorithm: AnomalyAlgorithm },
    /// Track emails semantically close to a free-text query.
    SemanticMatch {
        query: String,
        #[serde(default = "default_similarity")]
        similarity_threshold: f64,
        #[serde(default = "default_min_matches")]
        min_matches: u32,
        #[serde(default)]
        algorithm: SemanticAlgorithm,
    },
}

impl AlertKind {
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::Static { .. } => "static",
            AlertKind::Anomaly { .. } => "anomaly",
            AlertKind::SemanticMatch { .. } => "semantic_match",
        }
    }

    /// Clustering algorithm driving this kind, if any.
    pub fn clustering(&self) -> Option<ClusteringAlgorithm> {
        match self {
            AlertKind::Anomaly { algorithm } => match algorithm.strategy() {
                Strategy::Clustering(algo) => Some(algo),
                Strategy::Statistical(_) => None,
            },
            AlertKind::SemanticMatch { algorithm, .. } => Some(algorithm.clustering()),
            AlertKind::Static { .. } => None,
        }
    }
}

fn default_static_value() -> f64 {
    100.0
}

fn default_similarity() -> f64 {
    0.3
}

fn default_min_matches() -> u32 {
    5
}

// ── Static ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaticOperator {
    #[default]
    GreaterThan,
    LessThan,
    Equals,
    NotEquals,
}

impl StaticOperator {
    /// Strict comparison of `value` against `threshold`.
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            StaticOperator::GreaterThan => value > threshold,
            StaticOperator::LessThan => value < threshold,
            StaticOperator::Equals => value == threshold,
            StaticOperator::NotEquals => value != threshold,
        }
    }
}

impl fmt::Display for StaticOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticOperator::GreaterThan => write!(f, "greater than"),
            StaticOperator::LessThan => write!(f, "less than"),
            StaticOperator::Equals => write!(f, "equal to"),
            StaticOperator::NotEquals => write!(f, "not equal to"),
        }
    }
}

// ── Anomaly algorithms ───────────────────────────────────────────────

/// Algorithm of an anomaly alert. Unknown `type` names fail at load time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnomalyAlgorithm {
    Zscore(ZscoreParams),
    Ewma(EwmaParams),
    PercentageChange(PercentageChangeParams),
    Dbscan(DbscanParams),
    Kmeans(KmeansParams),
}

/// Evaluation path selected by an [`AnomalyAlgorithm`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Current window against one sample per prior day.
    Statistical(StatisticalAlgorithm),
    /// Clustering over the bucketed baseline plus current window.
    Clustering(ClusteringAlgorithm),
}

impl AnomalyAlgorithm {
    pub fn strategy(&self) -> Strategy {
        match *self {
            AnomalyAlgorithm::Zscore(p) => Strategy::Statistical(StatisticalAlgorithm::Zscore(p)),
            AnomalyAlgorithm::Ewma(p) => Strategy::Statistical(StatisticalAlgorithm::Ewma(p)),
            AnomalyAlgorithm::PercentageChange(p) => {
                Strategy::Statistical(StatisticalAlgorithm::PercentageChange(p))
            }
            AnomalyAlgorithm::Dbscan(p) => Strategy::Clustering(ClusteringAlgorithm::Dbscan(p)),
            AnomalyAlgorithm::Kmeans(p) => Strategy::Clustering(ClusteringAlgorithm::Kmeans(p)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AnomalyAlgorithm::Zscore(_) => "zscore",
            AnomalyAlgorithm::Ewma(_) => "ewma",
            AnomalyAlgorithm::PercentageChange(_) => "percentage_change",
            AnomalyAlgorithm::Dbscan(_) => "dbscan",
            AnomalyAlgorithm::Kmeans(_) => "kmeans",
        }
    }
}

/// Clustering algorithm used over the daily series of semantic matches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SemanticAlgorithm {
    Dbscan(DbscanParams),
    Kmeans(KmeansParams),
}

impl SemanticAlgorithm {
    pub fn clustering(&self) -> ClusteringAlgorithm {
        match *self {
            SemanticAlgorithm::Dbscan(p) => ClusteringAlgorithm::Dbscan(p),
            SemanticAlgorithm::Kmeans(p) => ClusteringAlgorithm::Kmeans(p),
        }
    }
}

impl Default for SemanticAlgorithm {
    fn default() -> Self {
        SemanticAlgorithm::Dbscan(DbscanParams::default())
    }
}
