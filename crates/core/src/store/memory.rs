use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::info;

use super::EventStore;
use crate::error::StoreError;
use crate::event::{
    Contributor, ContributorKey, EmailEvent, EventFilter, EventId, EventSummary, TimeRange,
};

/// In-process event store backed by a sorted `Vec`.
///
/// Used by the worker binary (events loaded from JSON lines) and by tests.
/// `set_available(false)` makes every query fail with
/// [`StoreError::Unavailable`].
pub struct MemoryEventStore {
    events: RwLock<Vec<EmailEvent>>,
    available: AtomicBool,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_events(mut events: Vec<EmailEvent>) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self {
            events: RwLock::new(events),
            available: AtomicBool::new(true),
        }
    }

    /// Load newline-delimited JSON events. Blank lines are skipped.
    pub fn from_jsonl(path: &Path) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        let mut events = Vec::new();
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: EmailEvent = serde_json::from_str(line)
                .map_err(|e| StoreError::Serialize(format!("line {}: {e}", line_no + 1)))?;
            events.push(event);
        }
        info!(path = %path.display(), count = events.len(), "loaded events");
        Ok(Self::with_events(events))
    }

    pub async fn insert(&self, event: EmailEvent) {
        let mut events = self.events.write().await;
        let pos = events.partition_point(|e| e.timestamp <= event.timestamp);
        events.insert(pos, event);
    }

    pub async fn extend(&self, batch: impl IntoIterator<Item = EmailEvent>) {
        let mut events = self.events.write().await;
        events.extend(batch);
        events.sort_by_key(|e| e.timestamp);
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("event store offline".to_string()))
        }
    }

    /// Apply `f` to every event in `range` matching `filter`.
    async fn for_each_match<F>(&self, range: TimeRange, filter: &EventFilter, mut f: F)
    where
        F: FnMut(&EmailEvent),
    {
        let events = self.events.read().await;
        let lo = events.partition_point(|e| e.timestamp < range.start);
        let hi = events.partition_point(|e| e.timestamp < range.end);
        for event in &events[lo..hi.max(lo)] {
            if filter.matches(event) {
                f(event);
            }
        }
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn count_events(&self, range: TimeRange, filter: &EventFilter) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut count = 0u64;
        self.for_each_match(range, filter, |_| count += 1).await;
        Ok(count)
    }

    async fn count_distinct_actors(
        &self,
        range: TimeRange,
        filter: &EventFilter,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut actors = HashSet::new();
        self.for_each_match(range, filter, |e| {
            if let Some(sender) = &e.sender {
                actors.insert(sender.to_ascii_lowercase());
            }
        })
        .await;
        Ok(actors.len() as u64)
    }

    async fn count_mentions(
        &self,
        range: TimeRange,
        filter: &EventFilter,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut count = 0u64;
        self.for_each_match(range, filter, |e| {
            count += e.matching_entities(filter).count() as u64;
        })
        .await;
        Ok(count)
    }

    async fn top_contributors(
        &self,
        range: TimeRange,
        filter: &EventFilter,
        by: ContributorKey,
        limit: usize,
    ) -> Result<Vec<Contributor>, StoreError> {
        self.check_available()?;
        let mut counts: HashMap<String, u64> = HashMap::new();
        self.for_each_match(range, filter, |e| match by {
            ContributorKey::Sender => {
                if let Some(sender) = &e.sender {
                    *counts.entry(sender.clone()).or_default() += 1;
                }
            }
            ContributorKey::Entity => {
                for entity in e.matching_entities(filter) {
                    *counts.entry(entity.text.clone()).or_default() += 1;
                }
            }
        })
        .await;

        let mut rows: Vec<Contributor> = counts
            .into_iter()
            .map(|(key, count)| Contributor { key, count })
            .collect();
        rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn scan(
        &self,
        range: TimeRange,
        filter: &EventFilter,
    ) -> Result<Vec<EventSummary>, StoreError> {
        self.check_available()?;
        let mut out = Vec::new();
        self.for_each_match(range, filter, |e| out.push(EventSummary::from(e)))
            .await;
        Ok(out)
    }

    async fn fetch_by_ids(&self, ids: &[EventId]) -> Result<Vec<EventSummary>, StoreError> {
        self.check_available()?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| wanted.contains(e.id.as_str()))
            .map(EventSummary::from)
            .collect())
    }

    async fn latest_event_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.check_available()?;
        Ok(self.events.read().await.last().map(|e| e.timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EntityTag;
    use chrono::{Duration, TimeZone};

    fn t(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn ev(id: &str, hour: i64, sender: &str, entities: &[&str]) -> EmailEvent {
        EmailEvent {
            id: id.to_string(),
            timestamp: t(hour),
            sender: Some(sender.to_string()),
            subject: String::new(),
            entities: entities
                .iter()
                .map(|text| EntityTag {
                    entity_type: "ORG".to_string(),
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    fn store() -> MemoryEventStore {
        MemoryEventStore::with_events(vec![
            ev("3", 5, "b@x.com", &["Acme"]),
            ev("1", 1, "a@x.com", &["Acme", "Globex"]),
            ev("2", 2, "a@x.com", &[]),
        ])
    }

    #[tokio::test]
    async fn counts_respect_half_open_range() {
        let store = store();
        let all = EventFilter::default();
        assert_eq!(store.count_events(TimeRange::new(t(1), t(5)), &all).await.unwrap(), 2);
        assert_eq!(store.count_events(TimeRange::new(t(0), t(6)), &all).await.unwrap(), 3);
        assert_eq!(
            store.count_distinct_actors(TimeRange::new(t(0), t(6)), &all).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn mentions_and_contributors() {
        let store = store();
        let range = TimeRange::new(t(0), t(10));
        let acme = EventFilter {
            entity_value: Some("acme".into()),
            ..Default::default()
        };
        assert_eq!(store.count_mentions(range, &acme).await.unwrap(), 2);
        assert_eq!(
            store.count_mentions(range, &EventFilter::default()).await.unwrap(),
            3
        );

        let top = store
            .top_contributors(range, &EventFilter::default(), ContributorKey::Sender, 5)
            .await
            .unwrap();
        assert_eq!(top[0], Contributor { key: "a@x.com".into(), count: 2 });

        let entities = store
            .top_contributors(range, &EventFilter::default(), ContributorKey::Entity, 1)
            .await
            .unwrap();
        assert_eq!(entities, vec![Contributor { key: "Acme".into(), count: 2 }]);
    }

    #[tokio::test]
    async fn latest_timestamp_and_outage() {
        let store = store();
        assert_eq!(store.latest_event_timestamp().await.unwrap(), Some(t(5)));
        store.set_available(false);
        assert!(matches!(
            store.latest_event_timestamp().await,
            Err(StoreError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn insert_keeps_order() {
        let store = store();
        store.insert(ev("0", 0, "c@x.com", &[])).await;
        let scanned = store
            .scan(TimeRange::new(t(0), t(10)), &EventFilter::default())
            .await
            .unwrap();
        let ids: Vec<_> = scanned.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "1", "2", "3"]);
        let fetched = store.fetch_by_ids(&["3".into(), "1".into()]).await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].id, "1");
    }
}
