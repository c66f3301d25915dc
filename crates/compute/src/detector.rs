//! Clustering anomaly detector over a 1-D series of bucket values.
//!
//! Values are standardized with statistics of the input window only, so the
//! detector is stateless: the same input always yields the same labels.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mailpulse_core::AnomalyType;

use crate::algorithms::kmeans::nearest_centroid;
use crate::algorithms::stats::{mean, percentile, standardize};
use crate::algorithms::{dbscan, euclidean, kmeans};

const KMEANS_MAX_ITERATIONS: usize = 100;

// ── Parameters ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DbscanParams {
    /// Neighbourhood radius in standardized units.
    #[serde(default = "default_eps")]
    pub eps: f64,
    /// Points (including itself) needed for a core point.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        Self {
            eps: default_eps(),
            min_samples: default_min_samples(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KmeansParams {
    #[serde(default = "default_k")]
    pub k: usize,
    /// Distance percentile above which a point is anomalous.
    #[serde(default = "default_percentile")]
    pub percentile: f64,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: default_k(),
            percentile: default_percentile(),
        }
    }
}

fn default_eps() -> f64 {
    0.5
}

fn default_min_samples() -> usize {
    5
}

fn default_k() -> usize {
    3
}

fn default_percentile() -> f64 {
    95.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusteringAlgorithm {
    Dbscan(DbscanParams),
    Kmeans(KmeansParams),
}

// ── Detection result ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointLabel {
    Cluster(usize),
    Noise,
}

#[derive(Debug, Clone)]
pub struct Detection {
    pub values: Vec<f64>,
    pub labels: Vec<PointLabel>,
    /// Indices of anomalous points, ascending.
    pub anomalies: Vec<usize>,
    /// Mean of the non-anomalous values.
    pub baseline: f64,
    /// Per-point centroid distance (k-means only).
    pub distances: Option<Vec<f64>>,
}

impl Detection {
    fn all_normal(values: &[f64]) -> Self {
        Self {
            values: values.to_vec(),
            labels: vec![PointLabel::Cluster(0); values.len()],
            anomalies: Vec::new(),
            baseline: mean(values),
            distances: None,
        }
    }

    pub fn is_anomaly(&self, index: usize) -> bool {
        self.anomalies.binary_search(&index).is_ok()
    }

    pub fn any_anomaly_in(&self, range: Range<usize>) -> bool {
        range.into_iter().any(|i| self.is_anomaly(i))
    }

    /// Spike/silence/unusual label for an anomalous point, `None` otherwise.
    pub fn anomaly_type(&self, index: usize) -> Option<AnomalyType> {
        if !self.is_anomaly(index) {
            return None;
        }
        self.values
            .get(index)
            .map(|&v| AnomalyType::classify(v, self.baseline))
    }

    /// Score of a sub-range of points.
    ///
    /// For k-means this is the mean centroid distance over the range; for
    /// DBSCAN it is the fraction of the range labelled noise.
    pub fn range_score(&self, range: Range<usize>) -> f64 {
        let end = range.end.min(self.values.len());
        let start = range.start.min(end);
        let len = end - start;
        if len == 0 {
            return 0.0;
        }
        match &self.distances {
            Some(distances) => distances[start..end].iter().sum::<f64>() / len as f64,
            None => {
                let noisy = (start..end).filter(|&i| self.is_anomaly(i)).count();
                noisy as f64 / len as f64
            }
        }
    }

    /// Per-point score used to annotate charts.
    pub fn point_score(&self, index: usize) -> f64 {
        match &self.distances {
            Some(distances) => distances.get(index).copied().unwrap_or(0.0),
            None => self
                .values
                .get(index)
                .map(|v| (v - self.baseline).abs() / (self.baseline + 1.0))
                .unwrap_or(0.0),
        }
    }
}

// ── Detector entry point ────────────────────────────────────────────

/// Label each value as normal or anomalous.
///
/// Too few points for the chosen algorithm (fewer than `min_samples` for
/// DBSCAN, fewer than `k` for k-means) is not an error: every point is
/// reported normal.
pub fn detect(values: &[f64], algorithm: &ClusteringAlgorithm) -> Detection {
    let detection = match algorithm {
        ClusteringAlgorithm::Dbscan(params) => detect_dbscan(values, params),
        ClusteringAlgorithm::Kmeans(params) => detect_kmeans(values, params),
    };
    debug!(
        points = values.len(),
        anomalies = detection.anomalies.len(),
        baseline = detection.baseline,
        "clustering detection complete"
    );
    detection
}

fn detect_dbscan(values: &[f64], params: &DbscanParams) -> Detection {
    if values.is_empty() || values.len() < params.min_samples {
        return Detection::all_normal(values);
    }

    let points: Vec<Vec<f64>> = standardize(values).into_iter().map(|v| vec![v]).collect();
    let result = dbscan(&points, params.eps, params.min_samples);

    let labels = result
        .labels
        .iter()
        .map(|l| l.map_or(PointLabel::Noise, PointLabel::Cluster))
        .collect();

    finish(values, labels, result.noise, None)
}

fn detect_kmeans(values: &[f64], params: &KmeansParams) -> Detection {
    let points: Vec<Vec<f64>> = standardize(values).into_iter().map(|v| vec![v]).collect();
    let result = match kmeans(&points, params.k, KMEANS_MAX_ITERATIONS) {
        Ok(r) => r,
        Err(e) => {
            debug!(error = %e, "k-means skipped");
            return Detection::all_normal(values);
        }
    };

    let sizes = result.cluster_sizes();
    let populated: Vec<Vec<f64>> = result
        .centroids
        .iter()
        .zip(&sizes)
        .filter(|&(_, &size)| size >= 2)
        .map(|(c, _)| c.clone())
        .collect();

    // A point alone in its cluster sits on its own centroid; measure it
    // against the nearest populated cluster instead.
    let mut distances = result.distances(&points);
    if points.len() > params.k && !populated.is_empty() {
        for (i, point) in points.iter().enumerate() {
            if sizes[result.assignments[i]] == 1 {
                let nearest = nearest_centroid(point, &populated);
                distances[i] = euclidean(point, &populated[nearest]);
            }
        }
    }

    let threshold = percentile(&distances, params.percentile);
    let anomalies: Vec<usize> = distances
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d > threshold)
        .map(|(i, _)| i)
        .collect();

    let labels = result
        .assignments
        .iter()
        .map(|&c| PointLabel::Cluster(c))
        .collect();

    finish(values, labels, anomalies, Some(distances))
}

fn finish(
    values: &[f64],
    labels: Vec<PointLabel>,
    anomalies: Vec<usize>,
    distances: Option<Vec<f64>>,
) -> Detection {
    let normal: Vec<f64> = values
        .iter()
        .enumerate()
        .filter(|(i, _)| anomalies.binary_search(i).is_err())
        .map(|(_, &v)| v)
        .collect();
    let baseline = if normal.is_empty() {
        mean(values)
    } else {
        mean(&normal)
    };

    Detection {
        values: values.to_vec(),
        labels,
        anomalies,
        baseline,
        distances,
    }
}
