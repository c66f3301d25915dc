//! Display data attached to every evaluation: the trend series and the
//! top contributors of the current window.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use mailpulse_compute::aggregate::bucketize;
use mailpulse_compute::{Aggregation, Detection, Resolution};
use mailpulse_core::{
    Contributor, EventFilter, EventStore, StoreError, TimeRange, TimeSeriesPoint,
};

use crate::schema::{AlertDefinition, MetricKind};

use super::metric::bucket_values;

/// Windows up to one day are charted hourly, longer ones daily.
const HOURLY_TREND_LIMIT_MINUTES: i64 = 1440;

/// Trend series over the `trend_days` before `close`.
pub(crate) async fn trend_series(
    store: &dyn EventStore,
    definition: &AlertDefinition,
    close: DateTime<Utc>,
    trend_days: i64,
) -> Result<Vec<TimeSeriesPoint>, StoreError> {
    let range = TimeRange::ending_at(close, Duration::days(trend_days))
        .unwrap_or_else(|| TimeRange::new(DateTime::<Utc>::MIN_UTC, close));
    let resolution = if definition.window.minutes() <= HOURLY_TREND_LIMIT_MINUTES {
        Resolution::Hourly
    } else {
        Resolution::Daily
    };

    let events = store.scan(range, &definition.filter).await?;
    let buckets = bucketize(&events, range, resolution);
    let values = bucket_values(definition.metric, &buckets);
    Ok(buckets
        .iter()
        .zip(values)
        .map(|(bucket, value)| TimeSeriesPoint::plain(bucket.start, value))
        .collect())
}

/// Copy anomaly flags from a clustering detection onto trend points that
/// share a bucket start.
pub(crate) fn annotate(
    points: &mut [TimeSeriesPoint],
    aggregation: &Aggregation,
    detection: &Detection,
) {
    let by_start: HashMap<DateTime<Utc>, usize> = aggregation
        .buckets
        .iter()
        .enumerate()
        .map(|(i, b)| (b.start, i))
        .collect();

    for point in points {
        let Some(&index) = by_start.get(&point.timestamp) else {
            continue;
        };
        if let Some(anomaly_type) = detection.anomaly_type(index) {
            point.is_anomaly = true;
            point.anomaly_type = Some(anomaly_type);
            point.anomaly_score = Some(detection.point_score(index));
        }
    }
}

/// The aggregation itself as an annotated series.
pub(crate) fn annotated_series(
    aggregation: &Aggregation,
    detection: &Detection,
) -> Vec<TimeSeriesPoint> {
    aggregation
        .buckets
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let value = detection.values.get(i).copied().unwrap_or(bucket.count as f64);
            match detection.anomaly_type(i) {
                Some(anomaly_type) => TimeSeriesPoint {
                    timestamp: bucket.start,
                    value,
                    is_anomaly: true,
                    anomaly_type: Some(anomaly_type),
                    anomaly_score: Some(detection.point_score(i)),
                },
                None => TimeSeriesPoint::plain(bucket.start, value),
            }
        })
        .collect()
}

pub(crate) async fn top_contributors(
    store: &dyn EventStore,
    metric: MetricKind,
    window: TimeRange,
    filter: &EventFilter,
    limit: usize,
) -> Result<Vec<Contributor>, StoreError> {
    store
        .top_contributors(window, filter, metric.contributor_key(), limit)
        .await
}
