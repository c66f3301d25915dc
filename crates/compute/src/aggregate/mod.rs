//! Time-bucket aggregation of raw events.
//!
//! Turns the events of a [`TimeRange`] into an ordered series of
//! [`TimeBucket`]s at a resolution chosen from the span length. Hourly and
//! daily series are zero-filled; weekly and monthly series only carry
//! buckets with data, since dense filling over decades is pointless.
//! Output is capped at [`MAX_BUCKETS`] by fixed-stride down-sampling.

mod resolution;


pub use resolution::Resolution;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use mailpulse_core::{EventFilter, EventId, EventStore, EventSummary, StoreError, TimeRange};

/// Upper bound on emitted buckets for a single aggregation.
pub const MAX_BUCKETS: usize = 3000;

/// Member ids retained per bucket.
pub const MAX_MEMBER_IDS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub start: DateTime<Utc>,
    pub count: u64,
    pub distinct_actors: u64,
    pub member_ids: Vec<EventId>,
}

impl TimeBucket {
    fn empty(start: DateTime<Utc>) -> Self {
        Self {
            start,
            count: 0,
            distinct_actors: 0,
            member_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub buckets: Vec<TimeBucket>,
    pub resolution: Resolution,
}

impl Aggregation {
    pub fn counts(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.count as f64).collect()
    }

    pub fn distinct_actor_counts(&self) -> Vec<f64> {
        self.buckets.iter().map(|b| b.distinct_actors as f64).collect()
    }

    /// Index of the first bucket starting at or after `ts`.
    pub fn first_index_from(&self, ts: DateTime<Utc>) -> usize {
        self.buckets.partition_point(|b| b.start < ts)
    }
}

/// Read-only aggregator over an [`EventStore`].
#[derive(Clone)]
pub struct Aggregator {
    store: Arc<dyn EventStore>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Bucket the events of `range` matching `filter`.
    ///
    /// When `email_ids` is given the range and resolution selection are
    /// bypassed: the listed events are grouped by calendar day wherever they
    /// fall in history.
    pub async fn aggregate(
        &self,
        range: TimeRange,
        filter: &EventFilter,
        email_ids: Option<&[EventId]>,
    ) -> Result<Aggregation, StoreError> {
        if let Some(ids) = email_ids {
            let events = self.store.fetch_by_ids(ids).await?;
            let buckets = downsample(group_sparse(&events, Resolution::Daily), MAX_BUCKETS);
            debug!(ids = ids.len(), buckets = buckets.len(), "aggregated allow-list by day");
            return Ok(Aggregation {
                buckets,
                resolution: Resolution::Daily,
            });
        }

        let resolution = Resolution::for_span(range.span());
        let events = self.store.scan(range, filter).await?;
        let buckets = downsample(bucketize(&events, range, resolution), MAX_BUCKETS);
        debug!(
            %resolution,
            events = events.len(),
            buckets = buckets.len(),
            "aggregated range"
        );
        Ok(Aggregation {
            buckets,
            resolution,
        })
    }
}

/// Group events into buckets at `resolution`.
///
/// Dense resolutions emit every bucket from the one containing
/// `range.start` up to the last one starting before `range.end`.
pub fn bucketize(events: &[EventSummary], range: TimeRange, resolution: Resolution) -> Vec<TimeBucket> {
    if !resolution.is_dense() {
        return group_sparse(events, resolution);
    }
    if range.start >= range.end {
        return Vec::new();
    }

    let mut grouped = group(events, resolution);
    let mut buckets = Vec::new();
    let mut cursor = resolution.truncate(range.start);
    while cursor < range.end {
        let bucket = grouped
            .remove(&cursor)
            .map(BucketAccumulator::finish)
            .unwrap_or_else(|| TimeBucket::empty(cursor));
        buckets.push(bucket);
        cursor = resolution.next(cursor);
    }
    buckets
}

fn group_sparse(events: &[EventSummary], resolution: Resolution) -> Vec<TimeBucket> {
    group(events, resolution)
        .into_values()
        .map(BucketAccumulator::finish)
        .collect()
}

fn group(events: &[EventSummary], resolution: Resolution) -> BTreeMap<DateTime<Utc>, BucketAccumulator> {
    let mut grouped: BTreeMap<DateTime<Utc>, BucketAccumulator> = BTreeMap::new();
    for event in events {
        let start = resolution.truncate(event.timestamp);
        grouped
            .entry(start)
            .or_insert_with(|| BucketAccumulator::new(start))
            .add(event);
    }
    grouped
}

/// Keep the first bucket of every `ceil(len / max)`-sized stride window.
pub fn downsample(buckets: Vec<TimeBucket>, max: usize) -> Vec<TimeBucket> {
    if max == 0 || buckets.len() <= max {
        return buckets;
    }
    let stride = buckets.len().div_ceil(max);
    debug!(from = buckets.len(), stride, "down-sampling buckets");
    buckets.into_iter().step_by(stride).collect()
}

struct BucketAccumulator {
    bucket: TimeBucket,
    actors: HashSet<String>,
}

impl BucketAccumulator {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            bucket: TimeBucket::empty(start),
            actors: HashSet::new(),
        }
    }

    fn add(&mut self, event: &EventSummary) {
        self.bucket.count += 1;
        if let Some(actor) = &event.actor {
            self.actors.insert(actor.to_ascii_lowercase());
        }
        if self.bucket.member_ids.len() < MAX_MEMBER_IDS {
            self.bucket.member_ids.push(event.id.clone());
        }
    }

    fn finish(self) -> TimeBucket {
        TimeBucket {
            distinct_actors: self.actors.len() as u64,
            ..self.bucket
        }
    }
}
