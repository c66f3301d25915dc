//! Metric measurement over a single range.

use mailpulse_compute::TimeBucket;
use mailpulse_core::{EventFilter, EventStore, StoreError, TimeRange};

use crate::schema::MetricKind;

/// Value of `metric` over `range`, via the store's counting queries.
pub(crate) async fn measure(
    store: &dyn EventStore,
    metric: MetricKind,
    range: TimeRange,
    filter: &EventFilter,
) -> Result<f64, StoreError> {
    let count = match metric {
        MetricKind::EmailVolume | MetricKind::KeywordMatches => {
            store.count_events(range, filter).await?
        }
        MetricKind::UniqueSenders => store.count_distinct_actors(range, filter).await?,
        MetricKind::EntityMentions => store.count_mentions(range, filter).await?,
    };
    Ok(count as f64)
}

/// Per-bucket series for `metric`.
///
/// Buckets only carry event and sender counts, so entity mentions are
/// approximated by the number of matching events per bucket.
pub(crate) fn bucket_values(metric: MetricKind, buckets: &[TimeBucket]) -> Vec<f64> {
    match metric {
        MetricKind::UniqueSenders => buckets.iter().map(|b| b.distinct_actors as f64).collect(),
        _ => buckets.iter().map(|b| b.count as f64).collect(),
    }
}

/// Percentage change against a clustering baseline, safe for a zero baseline.
pub(crate) fn relative_change(current: f64, baseline: f64) -> f64 {
    (current - baseline) / (baseline + 0.001) * 100.0
}
