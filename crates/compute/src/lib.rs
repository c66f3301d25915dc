//! Numeric core of the alert engine.
//!
//! - Time-bucket aggregation with automatic resolution selection
//! - DBSCAN / K-means clustering anomaly detection
//! - Z-score, EWMA and percentage-change baseline comparison

pub mod aggregate;
pub mod algorithms;
pub mod baseline;
pub mod detector;

pub use aggregate::{Aggregation, Aggregator, Resolution, TimeBucket, MAX_BUCKETS};
pub use baseline::{
    EwmaParams, PercentageChangeParams, StatisticalAlgorithm, StatisticalOutcome, ZscoreParams,
};
pub use detector::{detect, ClusteringAlgorithm, DbscanParams, Detection, KmeansParams, PointLabel};
