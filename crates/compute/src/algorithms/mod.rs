pub mod dbscan;
pub mod kmeans;
pub mod stats;

pub use dbscan::{dbscan, DbscanResult};
pub use kmeans::{kmeans, KmeansError, KmeansResult};

/// Squared Euclidean distance between two vectors.
#[inline]
pub(crate) fn squared_euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Euclidean distance (with sqrt).
#[inline]
pub(crate) fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    squared_euclidean(a, b).sqrt()
}
