//! Read-only event storage collaborator.
//!
//! The engine never owns raw events; it asks the store for counts and
//! projections over a [`TimeRange`] narrowed by an [`EventFilter`].

mod memory;

pub use memory::MemoryEventStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::event::{Contributor, ContributorKey, EventFilter, EventId, EventSummary, TimeRange};

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Number of events in `range` matching `filter`.
    async fn count_events(&self, range: TimeRange, filter: &EventFilter) -> Result<u64, StoreError>;

    /// Number of distinct senders among matching events.
    async fn count_distinct_actors(
        &self,
        range: TimeRange,
        filter: &EventFilter,
    ) -> Result<u64, StoreError>;

    /// Number of entity mentions (not events) matching the filter's entity predicate.
    async fn count_mentions(&self, range: TimeRange, filter: &EventFilter)
        -> Result<u64, StoreError>;

    /// Largest groups of matching events keyed by sender or entity text,
    /// ordered by count descending.
    async fn top_contributors(
        &self,
        range: TimeRange,
        filter: &EventFilter,
        by: ContributorKey,
        limit: usize,
    ) -> Result<Vec<Contributor>, StoreError>;

    /// Matching events in `range`, ordered by timestamp.
    async fn scan(&self, range: TimeRange, filter: &EventFilter)
        -> Result<Vec<EventSummary>, StoreError>;

    /// Events with the given ids regardless of time, ordered by timestamp.
    async fn fetch_by_ids(&self, ids: &[EventId]) -> Result<Vec<EventSummary>, StoreError>;

    /// Timestamp of the most recent event, `None` when the store is empty.
    async fn latest_event_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError>;
}
