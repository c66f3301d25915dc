//! Semantic-match alerts: daily volume of emails close to a free-text query.

use chrono::{DateTime, Utc};
use tracing::warn;

use mailpulse_compute::{detect, ClusteringAlgorithm, Resolution};
use mailpulse_core::{EngineError, EventFilter, TimeRange};

use crate::schema::{AlertDefinition, MetricKind};

use super::metric::relative_change;
use super::{trend, AlertEvaluator, Observation};

pub(super) struct SemanticRequest<'a> {
    pub query: &'a str,
    pub similarity_threshold: f64,
    pub min_matches: u32,
    pub algorithm: ClusteringAlgorithm,
}

impl AlertEvaluator {
    pub(super) async fn evaluate_semantic(
        &self,
        definition: &AlertDefinition,
        request: SemanticRequest<'_>,
        now: DateTime<Utc>,
        window: TimeRange,
    ) -> Result<Observation, EngineError> {
        let Some(matcher) = &self.matcher else {
            return Err(EngineError::invalid(
                &definition.id,
                "semantic_match alerts need a semantic matcher",
            ));
        };
        if definition.filter != EventFilter::default() {
            warn!(alert_id = %definition.id, "filter ignored for semantic_match alert");
        }

        let ids = matcher
            .matching_ids(request.query, request.similarity_threshold)
            .await?;
        let aggregation = self
            .aggregator
            .aggregate(window, &EventFilter::default(), Some(ids.as_slice()))
            .await?;
        let matched = EventFilter::default().with_ids(ids);
        let detection = detect(&aggregation.counts(), &request.algorithm);

        let current = self.store.count_events(window, &matched).await? as f64;
        let first_day = aggregation.first_index_from(Resolution::Daily.truncate(window.start));
        let current_days = first_day..aggregation.buckets.len();
        let over_minimum = current > f64::from(request.min_matches);
        let anomalous = over_minimum || detection.any_anomaly_in(current_days.clone());

        let reason = if over_minimum {
            Some(format!(
                "{current:.0} emails matched \"{}\" (minimum {})",
                request.query, request.min_matches
            ))
        } else if anomalous {
            Some(format!(
                "Unusual daily volume of emails matching \"{}\"",
                request.query
            ))
        } else {
            None
        };

        let top_contributors = trend::top_contributors(
            &*self.store,
            MetricKind::EmailVolume,
            window,
            &matched,
            self.settings.top_contributors,
        )
        .await?;

        Ok(Observation {
            now,
            current_value: current,
            baseline_value: detection.baseline,
            score: Some(detection.range_score(current_days)),
            percentage_change: Some(relative_change(current, detection.baseline)),
            anomalous,
            reason,
            time_series: trend::annotated_series(&aggregation, &detection),
            top_contributors,
        })
    }
}
