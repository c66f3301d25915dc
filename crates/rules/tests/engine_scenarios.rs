//! End-to-end scenarios for the alert engine against in-memory collaborators.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use mailpulse_core::{
    AlertSummary, EmailEvent, EngineConfig, EngineError, EvaluationResult, FixedClock,
    MemoryEventStore, NotificationStatus, Verdict,
};
use mailpulse_notify::{Dispatcher, NotificationSink, NotifyError};
use mailpulse_rules::schema::{AlertDefinition, MetricKind};
use mailpulse_rules::{AlertEngine, AlertRepository, MemoryAlertRepository};

// -- Fixtures ------------------------------------------------------------

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 12, 14, 30, 0).unwrap()
}

fn email(id: impl Into<String>, at: DateTime<Utc>) -> EmailEvent {
    EmailEvent {
        id: id.into(),
        timestamp: at,
        sender: Some("trader@bank.com".to_string()),
        subject: "order flow".to_string(),
        entities: Vec::new(),
    }
}

/// Static alert firing whenever at least one email arrived in the last day.
fn always_firing(id: &str, cooldown: &str) -> AlertDefinition {
    serde_yaml::from_str(&format!(
        "id: {id}\nname: {id}\nkind:\n  type: static\n  value: 0\ncooldown:\n{cooldown}"
    ))
    .unwrap()
}

/// Sink that counts deliveries and fails while `failing` is set.
#[derive(Default)]
struct RecordingSink {
    calls: Arc<AtomicUsize>,
    failing: AtomicBool,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn on_trigger(
        &self,
        _alert: &AlertSummary,
        _result: &EvaluationResult,
    ) -> Result<(), NotifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            Err(NotifyError::Delivery("webhook: 503".to_string()))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    clock: Arc<FixedClock>,
    store: Arc<MemoryEventStore>,
    repo: Arc<MemoryAlertRepository>,
    engine: AlertEngine,
}

async fn harness(
    events: Vec<EmailEvent>,
    definitions: Vec<AlertDefinition>,
    sink: Arc<dyn NotificationSink>,
) -> Harness {
    let clock = Arc::new(FixedClock::new(t0()));
    let store = Arc::new(MemoryEventStore::with_events(events));
    let repo = Arc::new(MemoryAlertRepository::with_definitions(definitions).await);
    let engine = AlertEngine::new(
        repo.clone(),
        store.clone(),
        sink,
        clock.clone(),
        EngineConfig::default(),
    );
    Harness {
        clock,
        store,
        repo,
        engine,
    }
}

async fn state_of(h: &Harness, id: &str) -> mailpulse_rules::schema::AlertState {
    h.repo.get(id).await.unwrap().unwrap().state
}

// -- Evaluation ----------------------------------------------------------

#[tokio::test]
async fn zscore_spike_triggers_and_notifies() {
    let daily = [10, 12, 8, 11, 9, 10, 12];
    let mut events = Vec::new();
    for (d, count) in daily.iter().enumerate() {
        for k in 0..*count {
            events.push(email(
                format!("b{d}-{k}"),
                t0() - Duration::days(d as i64 + 1) - Duration::minutes(k),
            ));
        }
    }
    for k in 0..30 {
        events.push(email(format!("c{k}"), t0() - Duration::minutes(k)));
    }
    let def: AlertDefinition = serde_yaml::from_str(
        "id: desk\nname: Desk volume\nseverity: high\nkind:\n  type: anomaly\n  algorithm:\n    type: zscore\n",
    )
    .unwrap();
    let sink = Arc::new(RecordingSink::default());
    let h = harness(events, vec![def], sink.clone()).await;

    let result = h.engine.evaluate("desk").await.unwrap();
    assert_eq!(result.verdict, Verdict::Triggered);
    assert!(result.triggered);
    assert_eq!(result.current_value, 30.0);
    assert_eq!(result.evaluated_at, t0());
    assert!(result.score.unwrap() > 2.5);

    let history_id = result.history_id.unwrap();
    let history = h.engine.get_history("desk", 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, history_id);
    assert_eq!(history[0].metric_value, 30.0);
    assert_eq!(history[0].time_series_snapshot.len(), 24);
    assert_eq!(
        h.engine.get_notification_status(history_id).await.unwrap(),
        NotificationStatus::Sent
    );
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);

    let state = state_of(&h, "desk").await;
    assert_eq!(state.trigger_count, 1);
    assert_eq!(state.last_value, Some(30.0));
    assert_eq!(state.last_triggered_at, Some(t0()));
    assert_eq!(state.last_checked_at, Some(t0()));
}

#[tokio::test]
async fn static_value_equal_to_threshold_does_not_trigger() {
    let events = (0..100)
        .map(|i| email(format!("e{i}"), t0() - Duration::minutes(i)))
        .collect();
    let def: AlertDefinition =
        serde_yaml::from_str("id: s\nname: s\nkind:\n  type: static\n  value: 100\n").unwrap();
    let h = harness(events, vec![def], Arc::new(RecordingSink::default())).await;

    let result = h.engine.evaluate("s").await.unwrap();
    assert_eq!(result.verdict, Verdict::NotTriggered);
    assert_eq!(result.current_value, 100.0);
    assert!(result.history_id.is_none());
    assert!(h.engine.get_history("s", 10).await.unwrap().is_empty());
    assert_eq!(state_of(&h, "s").await.last_value, Some(100.0));
}

#[tokio::test]
async fn unknown_alert_is_reported() {
    let h = harness(Vec::new(), Vec::new(), Arc::new(RecordingSink::default())).await;
    assert!(matches!(
        h.engine.evaluate("ghost").await,
        Err(EngineError::AlertNotFound(id)) if id == "ghost"
    ));
    assert!(matches!(
        h.engine.get_history("ghost", 5).await,
        Err(EngineError::AlertNotFound(_))
    ));
    assert!(matches!(
        h.engine.get_notification_status(uuid::Uuid::new_v4()).await,
        Err(EngineError::HistoryNotFound(_))
    ));
}

// -- Gate ----------------------------------------------------------------

#[tokio::test]
async fn three_consecutive_anomalies_required() {
    let def = always_firing("h", "  cooldown_minutes: 0\n  consecutive_anomalies: 3\n");
    let h = harness(vec![email("e", t0())], vec![def], Arc::new(RecordingSink::default())).await;

    let verdicts: Vec<Verdict> = {
        let mut out = Vec::new();
        for _ in 0..3 {
            out.push(h.engine.evaluate("h").await.unwrap().verdict);
        }
        out
    };
    assert_eq!(
        verdicts,
        vec![Verdict::Suppressed, Verdict::Suppressed, Verdict::Triggered]
    );
    assert_eq!(state_of(&h, "h").await.consecutive_anomaly_count, 0);
}

#[tokio::test]
async fn daily_cap_resets_on_next_day() {
    let def = always_firing("cap", "  cooldown_minutes: 0\n  max_alerts_per_day: 2\n");
    let h = harness(vec![email("e", t0())], vec![def], Arc::new(RecordingSink::default())).await;

    assert!(h.engine.evaluate("cap").await.unwrap().triggered);
    assert!(h.engine.evaluate("cap").await.unwrap().triggered);
    let capped = h.engine.evaluate("cap").await.unwrap();
    assert_eq!(capped.verdict, Verdict::Suppressed);
    assert_eq!(capped.reason.as_deref(), Some("max alerts per day reached (2)"));

    h.clock.advance(Duration::days(1));
    assert!(h.engine.evaluate("cap").await.unwrap().triggered);
    let state = state_of(&h, "cap").await;
    assert_eq!(state.alerts_today, 1);
    assert_eq!(state.trigger_count, 3);
}

#[tokio::test]
async fn cooldown_follows_event_time() {
    let def = always_firing("cd", "  cooldown_minutes: 60\n");
    let h = harness(vec![email("e0", t0())], vec![def], Arc::new(RecordingSink::default())).await;

    assert!(h.engine.evaluate("cd").await.unwrap().triggered);

    // Wall clock moves on, but no new data: still inside the cooldown.
    h.clock.advance(Duration::hours(3));
    let cooling = h.engine.evaluate("cd").await.unwrap();
    assert_eq!(cooling.verdict, Verdict::Suppressed);
    assert!(cooling.in_cooldown);
    assert_eq!(cooling.cooldown_remaining_minutes, Some(60));

    h.store.insert(email("e1", t0() + Duration::minutes(61))).await;
    assert!(h.engine.evaluate("cd").await.unwrap().triggered);
}

// -- Failures ------------------------------------------------------------

#[tokio::test]
async fn storage_outage_does_not_stop_the_batch() {
    let mut invalid = always_firing("broken", "  enabled: true\n");
    invalid.metric = MetricKind::KeywordMatches;
    let defs = vec![
        always_firing("a", "  consecutive_anomalies: 2\n"),
        always_firing("b", "  enabled: true\n"),
        invalid,
    ];
    let h = harness(vec![email("e", t0())], defs, Arc::new(RecordingSink::default())).await;

    // One anomalous observation so the streak counter is non-zero.
    assert_eq!(h.engine.evaluate("a").await.unwrap().verdict, Verdict::Suppressed);
    h.clock.advance(Duration::minutes(10));
    h.store.set_available(false);

    let mut outcomes = h.engine.evaluate_all().await.unwrap();
    outcomes.sort_by(|x, y| x.alert_id.cmp(&y.alert_id));
    assert_eq!(outcomes.len(), 3);

    for outcome in &outcomes[..2] {
        let result = outcome.result.as_ref().unwrap();
        assert_eq!(result.verdict, Verdict::NotTriggered);
        assert!(result.history_id.is_none());
    }
    match &outcomes[2].result {
        Err(EngineError::InvalidConfiguration { alert_id, .. }) => assert_eq!(alert_id, "broken"),
        other => panic!("expected invalid configuration, got {other:?}"),
    }

    let a = state_of(&h, "a").await;
    assert_eq!(a.consecutive_anomaly_count, 1);
    assert_eq!(a.last_checked_at, Some(t0() + Duration::minutes(10)));
    assert_eq!(
        state_of(&h, "broken").await.last_checked_at,
        Some(t0() + Duration::minutes(10))
    );
    assert!(h.engine.get_recent_triggers(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_windows_fail_alone() {
    let huge_window: AlertDefinition = serde_yaml::from_str(
        "id: huge-window\nname: huge\nwindow:\n  size: 1000000000\n  unit: days\nkind:\n  type: static\n  value: 0\n",
    )
    .unwrap();
    let huge_baseline: AlertDefinition = serde_yaml::from_str(
        "id: huge-baseline\nname: huge\nwindow:\n  baseline_days: 1000000000\nkind:\n  type: anomaly\n  algorithm:\n    type: zscore\n",
    )
    .unwrap();
    let defs = vec![
        always_firing("good", "  enabled: true\n"),
        huge_window,
        huge_baseline,
    ];
    let h = harness(vec![email("e", t0())], defs, Arc::new(RecordingSink::default())).await;

    let mut outcomes = h.engine.evaluate_all().await.unwrap();
    outcomes.sort_by(|x, y| x.alert_id.cmp(&y.alert_id));
    let ids: Vec<&str> = outcomes.iter().map(|o| o.alert_id.as_str()).collect();
    assert_eq!(ids, vec!["good", "huge-baseline", "huge-window"]);

    assert!(outcomes[0].result.as_ref().unwrap().triggered);
    for outcome in &outcomes[1..] {
        match &outcome.result {
            Err(EngineError::InvalidConfiguration { alert_id, .. }) => {
                assert_eq!(alert_id, &outcome.alert_id)
            }
            other => panic!("expected invalid configuration, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn concurrent_evaluations_trigger_once() {
    let def = always_firing("busy", "  cooldown_minutes: 60\n");
    let sink = Arc::new(RecordingSink::default());
    let h = Arc::new(harness(vec![email("e", t0())], vec![def], sink.clone()).await);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.engine.evaluate("busy").await.unwrap().verdict })
        })
        .collect();
    let mut triggered = 0;
    for task in tasks {
        if task.await.unwrap() == Verdict::Triggered {
            triggered += 1;
        }
    }

    assert_eq!(triggered, 1);
    assert_eq!(state_of(&h, "busy").await.trigger_count, 1);
    assert_eq!(h.engine.get_history("busy", 10).await.unwrap().len(), 1);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

// -- Notifications -------------------------------------------------------

#[tokio::test]
async fn missing_channels_mark_notification_skipped() {
    let def = always_firing("quiet", "  enabled: true\n");
    let h = harness(vec![email("e", t0())], vec![def], Arc::new(Dispatcher::empty())).await;

    let result = h.engine.evaluate("quiet").await.unwrap();
    assert!(result.triggered);
    assert_eq!(
        h.engine
            .get_notification_status(result.history_id.unwrap())
            .await
            .unwrap(),
        NotificationStatus::Skipped
    );
}

#[tokio::test]
async fn failed_notification_keeps_history_and_can_be_retried() {
    let def = always_firing("flaky", "  enabled: true\n");
    let sink = Arc::new(RecordingSink::default());
    sink.failing.store(true, Ordering::SeqCst);
    let h = harness(vec![email("e", t0())], vec![def], sink.clone()).await;

    let history_id = h.engine.evaluate("flaky").await.unwrap().history_id.unwrap();
    match h.engine.get_notification_status(history_id).await.unwrap() {
        NotificationStatus::Failed { error } => assert!(error.contains("503")),
        other => panic!("expected failed status, got {other:?}"),
    }
    assert_eq!(state_of(&h, "flaky").await.trigger_count, 1);

    sink.failing.store(false, Ordering::SeqCst);
    assert_eq!(h.engine.retry_failed(history_id).await.unwrap(), 1);
    assert_eq!(
        h.engine.get_notification_status(history_id).await.unwrap(),
        NotificationStatus::Sent
    );
    assert_eq!(h.engine.retry_failed(history_id).await.unwrap(), 0);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn recent_triggers_are_newest_first() {
    let defs = vec![
        always_firing("first", "  enabled: true\n"),
        always_firing("second", "  enabled: true\n"),
    ];
    let h = harness(vec![email("e0", t0())], defs, Arc::new(RecordingSink::default())).await;

    assert!(h.engine.evaluate("first").await.unwrap().triggered);
    h.store.insert(email("e1", t0() + Duration::minutes(5))).await;
    assert!(h.engine.evaluate("second").await.unwrap().triggered);

    let recent = h.engine.get_recent_triggers(10).await.unwrap();
    let ids: Vec<&str> = recent.iter().map(|r| r.alert_id.as_str()).collect();
    assert_eq!(ids, vec!["second", "first"]);
    assert!(recent[0].triggered_at > recent[1].triggered_at);
    assert_eq!(h.engine.get_recent_triggers(1).await.unwrap().len(), 1);
}
