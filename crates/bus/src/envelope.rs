use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::AggregateId;
use event_store::{DomainEvent, EventId, SequenceNumber};

/// Wire shape for events on the message bus.
///
/// Every published message carries this structure as JSON; projection
/// consumers decode the same shape on the way out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event_id: EventId,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub sequence_number: SequenceNumber,
    pub payload: serde_json::Value,
    pub metadata: BTreeMap<String, String>,
}

impl From<&DomainEvent> for Envelope {
    fn from(event: &DomainEvent) -> Self {
        Self {
            event_id: event.event_id,
            event_type: event.event_type.clone(),
            timestamp: event.timestamp,
            aggregate_id: event.aggregate_id,
            aggregate_type: event.aggregate_type.clone(),
            sequence_number: event.sequence_number,
            payload: event.payload.clone(),
            metadata: event.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_from_event_roundtrips_as_json() {
        let event = DomainEvent::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Instance")
            .event_type("InstanceCreated")
            .sequence_number(SequenceNumber::first())
            .payload_raw(serde_json::json!({"owner": "a"}))
            .metadata("instance_id", "i-1")
            .build();

        let envelope = Envelope::from(&event);
        let json = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();

        assert_eq!(back.event_id, event.event_id);
        assert_eq!(back.event_type, "InstanceCreated");
        assert_eq!(back.sequence_number, SequenceNumber::first());
        assert_eq!(back.metadata.get("instance_id").map(String::as_str), Some("i-1"));
    }
}
