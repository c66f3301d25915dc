//! [`AlertEngine`]: evaluation, gating, history and notification hooks.
//!
//! Each alert is evaluated under its own mutex, so state updates for one id
//! are serialized while different alerts proceed in parallel. Notifications
//! are delivered after the lock is released; their outcome is written back
//! onto the history record and never undoes the trigger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mailpulse_core::{
    AlertId, AlertSummary, Clock, EngineConfig, EngineError, EvaluationResult, EventStore,
    HistoryId, NotificationStatus, SemanticMatcher, StoreError, TriggerHistoryRecord, Verdict,
};
use mailpulse_notify::{NotificationSink, NotifyError};

use crate::evaluator::{AlertEvaluator, Observation};
use crate::gate::{CooldownGate, GateDecision};
use crate::repository::{AlertRepository, StoredAlert};

/// Result of one alert within a batch.
#[derive(Debug)]
pub struct AlertOutcome {
    pub alert_id: AlertId,
    pub result: Result<EvaluationResult, EngineError>,
}

pub struct AlertEngine {
    repository: Arc<dyn AlertRepository>,
    evaluator: AlertEvaluator,
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    locks: Mutex<HashMap<AlertId, Arc<Mutex<()>>>>,
}

impl AlertEngine {
    pub fn new(
        repository: Arc<dyn AlertRepository>,
        store: Arc<dyn EventStore>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let evaluator = AlertEvaluator::new(store, Arc::clone(&clock), config.evaluation.clone());
        Self {
            repository,
            evaluator,
            sink,
            clock,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Enable semantic_match alerts.
    pub fn with_matcher(self, matcher: Arc<dyn SemanticMatcher>) -> Self {
        Self {
            evaluator: self.evaluator.with_matcher(matcher),
            ..self
        }
    }

    pub fn repository(&self) -> &Arc<dyn AlertRepository> {
        &self.repository
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    async fn lock_for(&self, alert_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(alert_id.to_string()).or_default())
    }

    // ── Evaluation ───────────────────────────────────────────────────

    /// Evaluate one alert, gate the result and persist state and history.
    pub async fn evaluate(&self, alert_id: &str) -> Result<EvaluationResult, EngineError> {
        let lock = self.lock_for(alert_id).await;
        let (summary, result) = {
            let _guard = lock.lock().await;
            let Some(stored) = self.repository.get(alert_id).await? else {
                self.locks.lock().await.remove(alert_id);
                return Err(EngineError::AlertNotFound(alert_id.to_string()));
            };
            self.evaluate_locked(stored).await?
        };

        if let Some(history_id) = result.history_id {
            self.deliver(&summary, &result, history_id).await;
        }
        Ok(result)
    }

    async fn evaluate_locked(
        &self,
        stored: StoredAlert,
    ) -> Result<(AlertSummary, EvaluationResult), EngineError> {
        let StoredAlert {
            definition,
            mut state,
        } = stored;
        let summary = definition.summary();
        let checked_at = self.clock.now();
        state.last_checked_at = Some(checked_at);

        let observation = match self.evaluator.evaluate(&definition).await {
            Ok(observation) => observation,
            Err(EngineError::Storage(e)) => {
                warn!(alert_id = %definition.id, error = %e, "event storage failed, alert not evaluated");
                self.repository.save_state(&definition.id, &state).await?;
                return Ok((summary, storage_failure(&definition.id, checked_at, &e)));
            }
            Err(e) => {
                self.repository.save_state(&definition.id, &state).await?;
                return Err(e);
            }
        };

        let decision = CooldownGate::apply(
            &mut state,
            &definition.cooldown,
            &observation,
            observation.now,
            self.clock.today(),
        );
        let mut result = build_result(&definition.id, observation, decision);

        // Counters first: a lost history row must not let the trigger fire again.
        self.repository.save_state(&definition.id, &state).await?;

        if result.triggered {
            let record =
                TriggerHistoryRecord::from_result(&result, self.config.evaluation.history_snapshot_points);
            result.history_id = Some(record.id);
            self.repository.append_history(record).await?;
            info!(
                alert_id = %definition.id,
                severity = %definition.severity,
                current = result.current_value,
                baseline = result.baseline_value,
                reason = result.reason.as_deref().unwrap_or_default(),
                "alert triggered"
            );
        } else {
            debug!(
                alert_id = %definition.id,
                verdict = ?result.verdict,
                reason = result.reason.as_deref().unwrap_or_default(),
                "alert not triggered"
            );
        }

        Ok((summary, result))
    }

    /// Evaluate every enabled alert.
    pub async fn evaluate_all(&self) -> Result<Vec<AlertOutcome>, EngineError> {
        let ids = self
            .repository
            .list()
            .await?
            .into_iter()
            .filter(|s| s.definition.enabled)
            .map(|s| s.definition.id)
            .collect();
        Ok(self.evaluate_batch(ids, None).await)
    }

    /// Evaluate `ids` with bounded concurrency.
    ///
    /// When `cancel` is set no further alerts are started; alerts already
    /// running finish normally.
    pub async fn evaluate_batch(
        &self,
        ids: Vec<AlertId>,
        cancel: Option<&AtomicBool>,
    ) -> Vec<AlertOutcome> {
        let concurrency = self.config.scheduler.max_concurrency.max(1);
        stream::iter(ids)
            .take_while(|_| {
                let cancelled = cancel.is_some_and(|flag| flag.load(Ordering::SeqCst));
                futures::future::ready(!cancelled)
            })
            .map(|alert_id| async move {
                let result = self.evaluate(&alert_id).await;
                if let Err(e) = &result {
                    warn!(alert_id = %alert_id, error = %e, "alert evaluation failed");
                }
                AlertOutcome { alert_id, result }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }

    // ── Notifications ────────────────────────────────────────────────

    async fn deliver(&self, alert: &AlertSummary, result: &EvaluationResult, history_id: HistoryId) {
        let status = match self.sink.on_trigger(alert, result).await {
            Ok(()) => NotificationStatus::Sent,
            Err(NotifyError::NoChannels(_)) => {
                debug!(alert_id = %alert.id, "no notification channels, skipped");
                NotificationStatus::Skipped
            }
            Err(e) => {
                warn!(alert_id = %alert.id, %history_id, error = %e, "notification failed");
                NotificationStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        if let Err(e) = self.repository.set_notification_status(history_id, status).await {
            warn!(%history_id, error = %e, "failed to record notification status");
        }
    }

    /// Re-send the notification of a failed trigger. Returns the number of
    /// retries attempted (0 when the record is not in a failed state).
    pub async fn retry_failed(&self, history_id: HistoryId) -> Result<usize, EngineError> {
        let record = self
            .repository
            .get_history_record(history_id)
            .await?
            .ok_or_else(|| EngineError::HistoryNotFound(history_id.to_string()))?;
        if !record.notification_status.is_failed() {
            return Ok(0);
        }

        let stored = self
            .repository
            .get(&record.alert_id)
            .await?
            .ok_or_else(|| EngineError::AlertNotFound(record.alert_id.clone()))?;
        info!(alert_id = %record.alert_id, %history_id, "retrying notification");
        let result = result_from_record(record);
        self.deliver(&stored.definition.summary(), &result, history_id)
            .await;
        Ok(1)
    }

    /// Delete an alert and its history, waiting for any evaluation in flight.
    pub async fn remove_alert(&self, alert_id: &str) -> Result<bool, EngineError> {
        let lock = self.lock_for(alert_id).await;
        let removed = {
            let _guard = lock.lock().await;
            self.repository.remove(alert_id).await?
        };
        self.locks.lock().await.remove(alert_id);
        if removed {
            info!(alert_id = %alert_id, "alert removed");
        }
        Ok(removed)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub async fn get_history(
        &self,
        alert_id: &str,
        limit: usize,
    ) -> Result<Vec<TriggerHistoryRecord>, EngineError> {
        if self.repository.get(alert_id).await?.is_none() {
            return Err(EngineError::AlertNotFound(alert_id.to_string()));
        }
        Ok(self.repository.history(alert_id, limit).await?)
    }

    /// Latest triggers across every alert, newest first.
    pub async fn get_recent_triggers(
        &self,
        limit: usize,
    ) -> Result<Vec<TriggerHistoryRecord>, EngineError> {
        Ok(self.repository.recent_history(limit).await?)
    }

    pub async fn get_notification_status(
        &self,
        history_id: HistoryId,
    ) -> Result<NotificationStatus, EngineError> {
        self.repository
            .get_history_record(history_id)
            .await?
            .map(|r| r.notification_status)
            .ok_or_else(|| EngineError::HistoryNotFound(history_id.to_string()))
    }
}

// ── Result assembly ──────────────────────────────────────────────────

fn build_result(alert_id: &str, observation: Observation, decision: GateDecision) -> EvaluationResult {
    EvaluationResult {
        alert_id: alert_id.to_string(),
        triggered: decision.triggered(),
        verdict: decision.verdict,
        reason: decision.reason,
        current_value: observation.current_value,
        baseline_value: observation.baseline_value,
        score: observation.score,
        percentage_change: observation.percentage_change,
        time_series: observation.time_series,
        in_cooldown: decision.in_cooldown,
        cooldown_remaining_minutes: decision.cooldown_remaining_minutes,
        top_contributors: observation.top_contributors,
        evaluated_at: observation.now,
        history_id: None,
    }
}

fn storage_failure(
    alert_id: &str,
    at: DateTime<Utc>,
    error: &StoreError,
) -> EvaluationResult {
    EvaluationResult {
        alert_id: alert_id.to_string(),
        verdict: Verdict::NotTriggered,
        triggered: false,
        reason: Some(format!("evaluation skipped: {error}")),
        current_value: 0.0,
        baseline_value: 0.0,
        score: None,
        percentage_change: None,
        time_series: Vec::new(),
        in_cooldown: false,
        cooldown_remaining_minutes: None,
        top_contributors: Vec::new(),
        evaluated_at: at,
        history_id: None,
    }
}

fn result_from_record(record: TriggerHistoryRecord) -> EvaluationResult {
    EvaluationResult {
        alert_id: record.alert_id,
        verdict: Verdict::Triggered,
        triggered: true,
        reason: Some(record.reason),
        current_value: record.metric_value,
        baseline_value: record.baseline_value,
        score: record.score,
        percentage_change: record.percentage_change,
        time_series: record.time_series_snapshot,
        in_cooldown: false,
        cooldown_remaining_minutes: None,
        top_contributors: record.top_contributors,
        evaluated_at: record.triggered_at,
        history_id: Some(record.id),
    }
}
