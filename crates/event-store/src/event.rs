use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::AggregateId;

/// Metadata key carrying the game instance an event belongs to.
///
/// Used as the partition key when publishing, so that all events of one
/// playthrough stay ordered relative to each other.
pub const META_INSTANCE_ID: &str = "instance_id";

/// Metadata key carrying the agent (player or system) that caused an event.
pub const META_AGENT_ID: &str = "agent_id";

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Position of an event within its aggregate stream.
///
/// Sequence numbers start at 1 for the first event and are gapless per
/// `(aggregate_id, aggregate_type)` stream. An aggregate's sequence equals
/// the number of events applied to it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(i64);

impl SequenceNumber {
    /// Creates a sequence number from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial sequence (0) for a stream with no events.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the first sequence number (1).
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next sequence number.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<SequenceNumber> for i64 {
    fn from(seq: SequenceNumber) -> Self {
        seq.0
    }
}

/// An immutable fact recorded in the event log.
///
/// Created once, never mutated. `payload` carries the type-erased business
/// data keyed by field name; `metadata` carries cross-cutting routing keys
/// (notably [`META_INSTANCE_ID`] and [`META_AGENT_ID`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// Discriminator string (e.g. "PartyCreated", "CharacterCreated").
    pub event_type: String,

    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,

    /// The aggregate stream this event belongs to.
    pub aggregate_id: AggregateId,

    /// The kind of aggregate (e.g. "Party", "Character", "Instance").
    pub aggregate_type: String,

    /// Position within the aggregate stream, starting at 1.
    pub sequence_number: SequenceNumber,

    /// Business data, opaque to the store.
    pub payload: serde_json::Value,

    /// String map of cross-cutting routing/correlation keys.
    pub metadata: BTreeMap<String, String>,
}

impl DomainEvent {
    /// Creates a new event builder.
    pub fn builder() -> DomainEventBuilder {
        DomainEventBuilder::default()
    }

    /// Returns the instance id routing key, if present.
    pub fn instance_meta(&self) -> Option<&str> {
        self.metadata.get(META_INSTANCE_ID).map(String::as_str)
    }
}

/// Builder for constructing domain events.
#[derive(Debug, Default)]
pub struct DomainEventBuilder {
    event_id: Option<EventId>,
    event_type: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    sequence_number: Option<SequenceNumber>,
    payload: Option<serde_json::Value>,
    metadata: BTreeMap<String, String>,
}

impl DomainEventBuilder {
    /// Sets the event ID. If not set, a new ID is generated.
    pub fn event_id(mut self, id: EventId) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Sets the event type discriminator.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the timestamp. If not set, the current time is used.
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the aggregate ID.
    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    /// Sets the aggregate type.
    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    /// Sets the stream position.
    pub fn sequence_number(mut self, seq: SequenceNumber) -> Self {
        self.sequence_number = Some(seq);
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Adds a metadata entry.
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Builds the event, returning `None` if a required field is missing.
    pub fn try_build(self) -> Option<DomainEvent> {
        Some(DomainEvent {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type?,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            aggregate_id: self.aggregate_id?,
            aggregate_type: self.aggregate_type?,
            sequence_number: self.sequence_number?,
            payload: self.payload?,
            metadata: self.metadata,
        })
    }

    /// Builds the event.
    ///
    /// # Panics
    ///
    /// Panics if a required field (event_type, aggregate_id, aggregate_type,
    /// sequence_number, payload) is not set.
    pub fn build(self) -> DomainEvent {
        DomainEvent {
            event_id: self.event_id.unwrap_or_default(),
            event_type: self.event_type.expect("event_type is required"),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            aggregate_id: self.aggregate_id.expect("aggregate_id is required"),
            aggregate_type: self.aggregate_type.expect("aggregate_type is required"),
            sequence_number: self.sequence_number.expect("sequence_number is required"),
            payload: self.payload.expect("payload is required"),
            metadata: self.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_id_new_creates_unique_ids() {
        assert_ne!(EventId::new(), EventId::new());
    }

    #[test]
    fn sequence_ordering() {
        let s1 = SequenceNumber::new(1);
        let s2 = SequenceNumber::new(2);
        assert!(s1 < s2);
        assert_eq!(s1.next(), s2);
    }

    #[test]
    fn sequence_initial_and_first() {
        assert_eq!(SequenceNumber::initial().as_i64(), 0);
        assert_eq!(SequenceNumber::first().as_i64(), 1);
        assert_eq!(SequenceNumber::initial().next(), SequenceNumber::first());
    }

    #[test]
    fn event_builder() {
        let aggregate_id = AggregateId::new();
        let payload = serde_json::json!({"name": "Vex"});

        let event = DomainEvent::builder()
            .event_type("CharacterCreated")
            .aggregate_id(aggregate_id)
            .aggregate_type("Character")
            .sequence_number(SequenceNumber::first())
            .payload_raw(payload.clone())
            .metadata(META_INSTANCE_ID, "abc")
            .build();

        assert_eq!(event.event_type, "CharacterCreated");
        assert_eq!(event.aggregate_id, aggregate_id);
        assert_eq!(event.sequence_number, SequenceNumber::first());
        assert_eq!(event.payload, payload);
        assert_eq!(event.instance_meta(), Some("abc"));
    }

    #[test]
    fn try_build_returns_none_on_missing_fields() {
        assert!(DomainEvent::builder().try_build().is_none());
    }
}
