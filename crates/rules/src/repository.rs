//! Persistence seam for alert definitions, their state and trigger history.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use mailpulse_core::{AlertId, HistoryId, NotificationStatus, StoreError, TriggerHistoryRecord};

use crate::schema::{AlertDefinition, AlertState};

/// A definition together with its mutable state.
#[derive(Debug, Clone)]
pub struct StoredAlert {
    pub definition: AlertDefinition,
    pub state: AlertState,
}

/// Durable storage for everything the engine owns.
///
/// History reads return records newest first.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<StoredAlert>, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<StoredAlert>, StoreError>;

    /// Insert or replace a definition, keeping any existing state.
    async fn upsert(&self, definition: AlertDefinition) -> Result<(), StoreError>;

    /// Remove a definition together with its history. Returns whether it existed.
    async fn remove(&self, id: &str) -> Result<bool, StoreError>;

    async fn save_state(&self, id: &str, state: &AlertState) -> Result<(), StoreError>;

    async fn append_history(&self, record: TriggerHistoryRecord) -> Result<(), StoreError>;

    async fn history(
        &self,
        alert_id: &str,
        limit: usize,
    ) -> Result<Vec<TriggerHistoryRecord>, StoreError>;

    /// Most recent records across every alert.
    async fn recent_history(&self, limit: usize) -> Result<Vec<TriggerHistoryRecord>, StoreError>;

    async fn get_history_record(
        &self,
        id: HistoryId,
    ) -> Result<Option<TriggerHistoryRecord>, StoreError>;

    /// Returns whether the record existed.
    async fn set_notification_status(
        &self,
        id: HistoryId,
        status: NotificationStatus,
    ) -> Result<bool, StoreError>;
}

// ── In-memory implementation ─────────────────────────────────────────

#[derive(Default)]
struct Inner {
    alerts: BTreeMap<AlertId, StoredAlert>,
    /// Append order.
    history: Vec<TriggerHistoryRecord>,
}

/// Process-local repository used by the worker and tests.
#[derive(Default)]
pub struct MemoryAlertRepository {
    inner: RwLock<Inner>,
}

impl MemoryAlertRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_definitions(definitions: impl IntoIterator<Item = AlertDefinition>) -> Self {
        let repo = Self::new();
        {
            let mut inner = repo.inner.write().await;
            for definition in definitions {
                inner.alerts.insert(
                    definition.id.clone(),
                    StoredAlert {
                        definition,
                        state: AlertState::default(),
                    },
                );
            }
        }
        repo
    }
}

/// Newest first; among equal timestamps the later append comes first.
fn newest_first<'a>(
    records: impl DoubleEndedIterator<Item = &'a TriggerHistoryRecord>,
    limit: usize,
) -> Vec<TriggerHistoryRecord> {
    let mut out: Vec<TriggerHistoryRecord> = records.rev().cloned().collect();
    out.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
    out.truncate(limit);
    out
}

#[async_trait]
impl AlertRepository for MemoryAlertRepository {
    async fn list(&self) -> Result<Vec<StoredAlert>, StoreError> {
        Ok(self.inner.read().await.alerts.values().cloned().collect())
    }

    async fn get(&self, id: &str) -> Result<Option<StoredAlert>, StoreError> {
        Ok(self.inner.read().await.alerts.get(id).cloned())
    }

    async fn upsert(&self, definition: AlertDefinition) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.alerts.get_mut(&definition.id) {
            Some(stored) => stored.definition = definition,
            None => {
                inner.alerts.insert(
                    definition.id.clone(),
                    StoredAlert {
                        definition,
                        state: AlertState::default(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let existed = inner.alerts.remove(id).is_some();
        inner.history.retain(|r| r.alert_id != id);
        Ok(existed)
    }

    async fn save_state(&self, id: &str, state: &AlertState) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.alerts.get_mut(id) {
            Some(stored) => stored.state = state.clone(),
            None => debug!(alert_id = %id, "state dropped for removed alert"),
        }
        Ok(())
    }

    async fn append_history(&self, record: TriggerHistoryRecord) -> Result<(), StoreError> {
        self.inner.write().await.history.push(record);
        Ok(())
    }

    async fn history(
        &self,
        alert_id: &str,
        limit: usize,
    ) -> Result<Vec<TriggerHistoryRecord>, StoreError> {
        let inner = self.inner.read().await;
        let matching: Vec<&TriggerHistoryRecord> =
            inner.history.iter().filter(|r| r.alert_id == alert_id).collect();
        Ok(newest_first(matching.into_iter(), limit))
    }

    async fn recent_history(&self, limit: usize) -> Result<Vec<TriggerHistoryRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(newest_first(inner.history.iter(), limit))
    }

    async fn get_history_record(
        &self,
        id: HistoryId,
    ) -> Result<Option<TriggerHistoryRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.history.iter().find(|r| r.id == id).cloned())
    }

    async fn set_notification_status(
        &self,
        id: HistoryId,
        status: NotificationStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.history.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.notification_status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use mailpulse_core::NotificationStatus;
    use uuid::Uuid;

    fn definition(id: &str) -> AlertDefinition {
        serde_yaml::from_str(&format!("id: {id}\nname: {id}\nkind:\n  type: static\n")).unwrap()
    }

    fn record(alert_id: &str, minutes: i64) -> TriggerHistoryRecord {
        TriggerHistoryRecord {
            id: Uuid::new_v4(),
            alert_id: alert_id.to_string(),
            triggered_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
            metric_value: 1.0,
            baseline_value: 0.0,
            score: None,
            percentage_change: None,
            reason: String::new(),
            top_contributors: Vec::new(),
            time_series_snapshot: Vec::new(),
            notification_status: NotificationStatus::Pending,
        }
    }

    #[tokio::test]
    async fn upsert_keeps_state() {
        let repo = MemoryAlertRepository::new();
        repo.upsert(definition("a")).await.unwrap();
        let state = AlertState {
            trigger_count: 3,
            ..Default::default()
        };
        repo.save_state("a", &state).await.unwrap();

        let mut updated = definition("a");
        updated.name = "renamed".into();
        repo.upsert(updated).await.unwrap();

        let stored = repo.get("a").await.unwrap().unwrap();
        assert_eq!(stored.definition.name, "renamed");
        assert_eq!(stored.state.trigger_count, 3);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let repo = MemoryAlertRepository::with_definitions([definition("a"), definition("b")]).await;
        repo.append_history(record("a", 10)).await.unwrap();
        repo.append_history(record("b", 30)).await.unwrap();
        repo.append_history(record("a", 20)).await.unwrap();

        let a = repo.history("a", 10).await.unwrap();
        assert_eq!(a.len(), 2);
        assert!(a[0].triggered_at > a[1].triggered_at);

        let recent = repo.recent_history(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].alert_id, "b");
        assert_eq!(recent[1].alert_id, "a");
    }

    #[tokio::test]
    async fn remove_cascades_history() {
        let repo = MemoryAlertRepository::with_definitions([definition("a")]).await;
        let rec = record("a", 0);
        let id = rec.id;
        repo.append_history(rec).await.unwrap();

        assert!(repo.remove("a").await.unwrap());
        assert!(repo.get_history_record(id).await.unwrap().is_none());
        assert!(!repo.remove("a").await.unwrap());
    }

    #[tokio::test]
    async fn notification_status_updates() {
        let repo = MemoryAlertRepository::new();
        let rec = record("a", 0);
        let id = rec.id;
        repo.append_history(rec).await.unwrap();

        assert!(repo.set_notification_status(id, NotificationStatus::Sent).await.unwrap());
        let stored = repo.get_history_record(id).await.unwrap().unwrap();
        assert_eq!(stored.notification_status, NotificationStatus::Sent);
        assert!(!repo
            .set_notification_status(Uuid::new_v4(), NotificationStatus::Sent)
            .await
            .unwrap());
    }
}
