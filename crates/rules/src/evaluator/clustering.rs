//! Anomaly alerts backed by a clustering detector.

use chrono::{DateTime, Duration, Utc};

use mailpulse_compute::{detect, ClusteringAlgorithm};
use mailpulse_core::{AnomalyType, EngineError, TimeRange};

use crate::schema::AlertDefinition;

use super::metric::{bucket_values, measure, relative_change};
use super::{out_of_range, trend, AlertEvaluator, Observation};

impl AlertEvaluator {
    pub(super) async fn evaluate_clustering(
        &self,
        definition: &AlertDefinition,
        algorithm: &ClusteringAlgorithm,
        now: DateTime<Utc>,
        window: TimeRange,
    ) -> Result<Observation, EngineError> {
        let history_start = window
            .start
            .checked_sub_signed(Duration::days(i64::from(definition.window.baseline_days)))
            .ok_or_else(|| out_of_range(definition))?;
        let history = TimeRange::new(history_start, window.end);
        let aggregation = self
            .aggregator
            .aggregate(history, &definition.filter, None)
            .await?;
        let values = bucket_values(definition.metric, &aggregation.buckets);
        let detection = detect(&values, algorithm);

        let current_buckets = aggregation.first_index_from(window.start)..values.len();
        let anomalous = detection.any_anomaly_in(current_buckets.clone());
        let score = detection.range_score(current_buckets.clone());

        let current = measure(&*self.store, definition.metric, window, &definition.filter).await?;
        // Per-bucket baseline scaled to the width of the window.
        let baseline = detection.baseline * current_buckets.len().max(1) as f64;
        let change = relative_change(current, baseline);

        let reason = anomalous.then(|| describe(definition, current, baseline, change));

        let mut time_series =
            trend::trend_series(&*self.store, definition, window.end, self.settings.trend_days)
                .await?;
        trend::annotate(&mut time_series, &aggregation, &detection);

        Ok(Observation {
            now,
            current_value: current,
            baseline_value: baseline,
            score: Some(score),
            percentage_change: Some(change),
            anomalous,
            reason,
            time_series,
            top_contributors: self.contributors(definition, window).await?,
        })
    }
}

fn describe(definition: &AlertDefinition, current: f64, baseline: f64, change: f64) -> String {
    let metric = definition.metric;
    match AnomalyType::classify(current, baseline) {
        AnomalyType::Spike => {
            format!("{metric} spiked by {change:.0}% compared to baseline")
        }
        AnomalyType::Silence => {
            format!("{metric} dropped by {:.0}% (possible silence)", change.abs())
        }
        AnomalyType::UnusualPattern => {
            format!("Unusual pattern detected in {metric} distribution")
        }
    }
}
