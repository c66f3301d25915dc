//! [`SchedulerLoop`]: periodic evaluation of due alerts.
//!
//! Each tick lists enabled alerts whose check frequency has elapsed since
//! their last check and hands them to the engine as one bounded batch.
//! Shutdown is cooperative: the flag is checked between alerts, so an
//! evaluation that has started always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use mailpulse_core::{AlertId, Clock, EngineError, EvaluationResult, Verdict};

use crate::engine::AlertEngine;

/// Tally of one scheduled pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub evaluated: usize,
    pub triggered: usize,
    pub suppressed: usize,
    pub not_triggered: usize,
    pub errors: usize,
}

pub struct SchedulerLoop {
    engine: Arc<AlertEngine>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    cancelled: AtomicBool,
    shutdown: Notify,
    wake: Notify,
}

impl SchedulerLoop {
    pub fn new(engine: Arc<AlertEngine>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            engine,
            clock,
            interval,
            cancelled: AtomicBool::new(false),
            shutdown: Notify::new(),
            wake: Notify::new(),
        }
    }

    /// Interval taken from the engine's scheduler settings.
    pub fn from_config(engine: Arc<AlertEngine>, clock: Arc<dyn Clock>) -> Self {
        let secs = engine.config().scheduler.check_interval_secs.max(1);
        Self::new(engine, clock, Duration::from_secs(secs))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run passes until [`shutdown`](Self::shutdown) is called.
    ///
    /// The first pass starts immediately.
    pub async fn run(&self) {
        if !self.engine.config().scheduler.enabled {
            info!("alert scheduler disabled");
            return;
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = self.interval.as_secs(), "alert scheduler started");

        loop {
            if self.is_cancelled() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => debug!("manual pass requested"),
                _ = self.shutdown.notified() => break,
            }
            if self.is_cancelled() {
                break;
            }

            match self.run_pass().await {
                Ok(summary) => info!(
                    evaluated = summary.evaluated,
                    triggered = summary.triggered,
                    suppressed = summary.suppressed,
                    errors = summary.errors,
                    "scheduled pass complete"
                ),
                Err(e) => warn!(error = %e, "scheduled pass failed"),
            }
        }

        info!("alert scheduler stopped");
    }

    /// Enabled alerts whose check frequency has elapsed.
    pub async fn due_alerts(&self) -> Result<Vec<AlertId>, EngineError> {
        let now = self.clock.now();
        let alerts = self.engine.repository().list().await?;
        Ok(alerts
            .into_iter()
            .filter(|s| {
                s.definition.enabled && s.state.is_due(s.definition.window.check_frequency(), now)
            })
            .map(|s| s.definition.id)
            .collect())
    }

    /// Evaluate every due alert once.
    pub async fn run_pass(&self) -> Result<PassSummary, EngineError> {
        let due = self.due_alerts().await?;
        if due.is_empty() {
            debug!("no alerts due");
            return Ok(PassSummary::default());
        }

        let outcomes = self.engine.evaluate_batch(due, Some(&self.cancelled)).await;
        let mut summary = PassSummary::default();
        for outcome in outcomes {
            summary.evaluated += 1;
            match outcome.result {
                Ok(result) => match result.verdict {
                    Verdict::Triggered => summary.triggered += 1,
                    Verdict::Suppressed => summary.suppressed += 1,
                    Verdict::NotTriggered => summary.not_triggered += 1,
                },
                Err(_) => summary.errors += 1,
            }
        }
        Ok(summary)
    }

    /// Wake the loop for an immediate pass.
    pub fn trigger_now(&self) {
        self.wake.notify_one();
    }

    /// Evaluate a single alert outside the schedule, under the same lock.
    pub async fn evaluate_now(&self, alert_id: &str) -> Result<EvaluationResult, EngineError> {
        self.engine.evaluate(alert_id).await
    }

    /// Stop after the alerts already in flight.
    pub fn shutdown(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }
}
