use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Unique event identifier as assigned by the ingest side.
pub type EventId = String;

/// A single email arrival with the entities extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailEvent {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub entities: Vec<EntityTag>,
}

/// An extracted entity mention (person, organization, ticker, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityTag {
    pub entity_type: String,
    pub text: String,
}

impl EmailEvent {
    /// Domain part of the sender address, lowercased.
    pub fn sender_domain(&self) -> Option<String> {
        self.sender
            .as_deref()
            .and_then(|s| s.rsplit_once('@'))
            .map(|(_, domain)| domain.trim().to_ascii_lowercase())
    }

    /// Entities matching the filter's entity predicate (all entities if none set).
    pub fn matching_entities<'a>(
        &'a self,
        filter: &'a EventFilter,
    ) -> impl Iterator<Item = &'a EntityTag> + 'a {
        self.entities.iter().filter(move |e| filter.entity_matches(e))
    }
}

/// Lightweight projection of an event used for bucketing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventSummary {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    pub actor: Option<String>,
}

impl From<&EmailEvent> for EventSummary {
    fn from(event: &EmailEvent) -> Self {
        Self {
            id: event.id.clone(),
            timestamp: event.timestamp,
            actor: event.sender.clone(),
        }
    }
}

// ── Filters ───────────────────────────────────────────────────

/// Predicate applied by the storage collaborator to every query.
///
/// Every populated field must match; an empty filter matches all events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EventFilter {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity_value: Option<String>,
    #[serde(default)]
    pub sender_domains: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub email_ids: Option<Vec<EventId>>,
}

impl EventFilter {
    pub fn has_entity_predicate(&self) -> bool {
        self.entity_type.is_some() || self.entity_value.is_some()
    }

    pub fn entity_matches(&self, entity: &EntityTag) -> bool {
        let type_ok = self
            .entity_type
            .as_deref()
            .is_none_or(|t| entity.entity_type.eq_ignore_ascii_case(t));
        let value_ok = self
            .entity_value
            .as_deref()
            .is_none_or(|v| entity.text.eq_ignore_ascii_case(v));
        type_ok && value_ok
    }

    pub fn matches(&self, event: &EmailEvent) -> bool {
        if let Some(ids) = &self.email_ids {
            if !ids.iter().any(|id| id == &event.id) {
                return false;
            }
        }

        if self.has_entity_predicate() && !event.entities.iter().any(|e| self.entity_matches(e)) {
            return false;
        }

        if !self.sender_domains.is_empty() {
            let Some(domain) = event.sender_domain() else {
                return false;
            };
            if !self
                .sender_domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(&domain))
            {
                return false;
            }
        }

        if !self.keywords.is_empty() {
            let subject = event.subject.to_lowercase();
            if !self
                .keywords
                .iter()
                .any(|k| subject.contains(&k.to_lowercase()))
            {
                return false;
            }
        }

        true
    }

    /// Copy of this filter restricted to an explicit id allow-list.
    pub fn with_ids(&self, ids: Vec<EventId>) -> Self {
        Self {
            email_ids: Some(ids),
            ..self.clone()
        }
    }
}

// ── Time ranges ───────────────────────────────────────────────

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Range of `width` ending (exclusively) at `end`; `None` when the start
    /// falls outside the representable calendar.
    pub fn ending_at(end: DateTime<Utc>, width: Duration) -> Option<Self> {
        let start = end.checked_sub_signed(width)?;
        Some(Self { start, end })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    /// Same width, shifted back in time by `by`.
    pub fn shifted_back(&self, by: Duration) -> Option<Self> {
        Some(Self {
            start: self.start.checked_sub_signed(by)?,
            end: self.end.checked_sub_signed(by)?,
        })
    }
}

// ── Contributors ──────────────────────────────────────────────

/// Grouping key for top-contributor queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContributorKey {
    Sender,
    Entity,
}

/// A single `{key, count}` row of a top-contributors breakdown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contributor {
    pub key: String,
    pub count: u64,
}
