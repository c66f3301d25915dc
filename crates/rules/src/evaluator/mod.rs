//! Alert definition evaluator.
//!
//! Turns one [`AlertDefinition`] into an [`Observation`]: the metric over the
//! current window, its baseline, whether it looks anomalous, and the data
//! shown alongside a notification. The evaluator never touches alert state;
//! gating the observation is the engine's job.
//!
//! Every evaluation is anchored on the newest event in the store, not the
//! wall clock, so replayed or delayed data is judged against itself.
//!
//! Paths by kind:
//! - **static**: metric over the window against a fixed value
//! - **anomaly / statistical**: window against the same window on each prior day
//! - **anomaly / clustering**: detector over the bucketed baseline plus window
//! - **semantic_match**: detector over the daily series of matched emails

mod clustering;
mod metric;
mod semantic;
mod trend;


use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use mailpulse_compute::baseline::{self, StatisticalAlgorithm};
use mailpulse_compute::Aggregator;
use mailpulse_core::config::EvaluationConfig;
use mailpulse_core::{
    Clock, Contributor, EngineError, EventStore, SemanticMatcher, StoreError, TimeRange,
    TimeSeriesPoint,
};

use crate::schema::{AlertDefinition, AlertKind, StaticOperator, Strategy};

use metric::measure;

/// Everything one evaluation produced, before gating.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Data-derived evaluation time.
    pub now: DateTime<Utc>,
    pub current_value: f64,
    pub baseline_value: f64,
    pub score: Option<f64>,
    pub percentage_change: Option<f64>,
    pub anomalous: bool,
    pub reason: Option<String>,
    pub time_series: Vec<TimeSeriesPoint>,
    pub top_contributors: Vec<Contributor>,
}

pub struct AlertEvaluator {
    store: Arc<dyn EventStore>,
    aggregator: Aggregator,
    matcher: Option<Arc<dyn SemanticMatcher>>,
    clock: Arc<dyn Clock>,
    settings: EvaluationConfig,
}

impl AlertEvaluator {
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>, settings: EvaluationConfig) -> Self {
        Self {
            aggregator: Aggregator::new(Arc::clone(&store)),
            store,
            matcher: None,
            clock,
            settings,
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn SemanticMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Latest event timestamp, or the wall clock when the store is empty.
    pub async fn resolve_now(&self) -> Result<DateTime<Utc>, StoreError> {
        Ok(self
            .store
            .latest_event_timestamp()
            .await?
            .unwrap_or_else(|| self.clock.now()))
    }

    /// Evaluate `definition` against the current contents of the store.
    ///
    /// Invalid definitions fail with [`EngineError::InvalidConfiguration`];
    /// storage failures surface as [`EngineError::Storage`].
    pub async fn evaluate(&self, definition: &AlertDefinition) -> Result<Observation, EngineError> {
        definition.validate()?;
        if matches!(definition.kind, AlertKind::SemanticMatch { .. }) && self.matcher.is_none() {
            return Err(EngineError::invalid(
                &definition.id,
                "semantic_match alerts need a semantic matcher",
            ));
        }

        let now = self.resolve_now().await?;
        // Half-open windows: close just past `now` so the newest event counts.
        let close = now
            .checked_add_signed(Duration::milliseconds(1))
            .ok_or_else(|| out_of_range(definition))?;
        let window = TimeRange::ending_at(close, definition.window.duration())
            .ok_or_else(|| out_of_range(definition))?;

        let observation = match &definition.kind {
            AlertKind::Static { operator, value } => {
                self.evaluate_static(definition, *operator, *value, now, window)
                    .await?
            }
            AlertKind::Anomaly { algorithm } => match algorithm.strategy() {
                Strategy::Statistical(algo) => {
                    self.evaluate_statistical(definition, &algo, now, window)
                        .await?
                }
                Strategy::Clustering(algo) => {
                    self.evaluate_clustering(definition, &algo, now, window)
                        .await?
                }
            },
            AlertKind::SemanticMatch {
                query,
                similarity_threshold,
                min_matches,
                algorithm,
            } => {
                let request = semantic::SemanticRequest {
                    query,
                    similarity_threshold: *similarity_threshold,
                    min_matches: *min_matches,
                    algorithm: algorithm.clustering(),
                };
                self.evaluate_semantic(definition, request, now, window)
                    .await?
            }
        };

        debug!(
            alert_id = %definition.id,
            kind = definition.kind.label(),
            current = observation.current_value,
            baseline = observation.baseline_value,
            anomalous = observation.anomalous,
            "alert evaluated"
        );
        Ok(observation)
    }

    // ── Static ───────────────────────────────────────────────────────

    async fn evaluate_static(
        &self,
        definition: &AlertDefinition,
        operator: StaticOperator,
        threshold: f64,
        now: DateTime<Utc>,
        window: TimeRange,
    ) -> Result<Observation, StoreError> {
        let current = measure(&*self.store, definition.metric, window, &definition.filter).await?;
        let anomalous = operator.holds(current, threshold);
        let reason = anomalous.then(|| {
            format!("Metric value {current:.0} is {operator} threshold {threshold:.0}")
        });

        Ok(Observation {
            now,
            current_value: current,
            baseline_value: threshold,
            score: None,
            percentage_change: None,
            anomalous,
            reason,
            time_series: self.plain_trend(definition, window.end).await?,
            top_contributors: self.contributors(definition, window).await?,
        })
    }

    // ── Statistical ──────────────────────────────────────────────────

    async fn evaluate_statistical(
        &self,
        definition: &AlertDefinition,
        algorithm: &StatisticalAlgorithm,
        now: DateTime<Utc>,
        window: TimeRange,
    ) -> Result<Observation, EngineError> {
        let store = &*self.store;
        let current = measure(store, definition.metric, window, &definition.filter).await?;

        // Oldest first: EWMA seeds its level from the first sample.
        let mut samples = Vec::with_capacity(definition.window.baseline_days as usize);
        for day in (1..=i64::from(definition.window.baseline_days)).rev() {
            let prior = window
                .shifted_back(Duration::days(day))
                .ok_or_else(|| out_of_range(definition))?;
            samples.push(measure(store, definition.metric, prior, &definition.filter).await?);
        }

        let outcome = baseline::evaluate(current, &samples, algorithm);
        Ok(Observation {
            now,
            current_value: current,
            baseline_value: outcome.baseline,
            score: outcome.score,
            percentage_change: outcome.percentage_change,
            anomalous: outcome.triggered,
            reason: outcome.reason,
            time_series: self.plain_trend(definition, window.end).await?,
            top_contributors: self.contributors(definition, window).await?,
        })
    }

    // ── Shared display data ──────────────────────────────────────────

    async fn plain_trend(
        &self,
        definition: &AlertDefinition,
        close: DateTime<Utc>,
    ) -> Result<Vec<TimeSeriesPoint>, StoreError> {
        trend::trend_series(&*self.store, definition, close, self.settings.trend_days).await
    }

    async fn contributors(
        &self,
        definition: &AlertDefinition,
        window: TimeRange,
    ) -> Result<Vec<Contributor>, StoreError> {
        trend::top_contributors(
            &*self.store,
            definition.metric,
            window,
            &definition.filter,
            self.settings.top_contributors,
        )
        .await
    }
}

/// A window or baseline reaching past the representable calendar.
fn out_of_range(definition: &AlertDefinition) -> EngineError {
    EngineError::invalid(
        &definition.id,
        "window or baseline reaches outside the supported time range",
    )
}
