use async_trait::async_trait;

use common::{AggregateId, InstanceId};

use crate::{DomainEvent, EventId, EventStoreError, Result, SequenceNumber};

/// Key identifying one aggregate stream within an append batch.
pub type StreamKey = (AggregateId, String);

/// Core trait for event store implementations.
///
/// The store exclusively owns durability and ordering of each aggregate
/// stream; aggregates only hold a transient, derived view. All
/// implementations must be thread-safe.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch of events atomically.
    ///
    /// The batch may span multiple aggregates; events are grouped by
    /// `(aggregate_id, aggregate_type)` and each group's first event must
    /// continue the stream at `current_max + 1`, with contiguous numbering
    /// in input order. All rows insert in one transaction.
    ///
    /// Fails with [`EventStoreError::ConcurrencyConflict`] when a
    /// `(aggregate_id, aggregate_type, sequence_number)` tuple already
    /// exists, the optimistic-lock signal that another writer interleaved.
    /// Callers must reload the aggregate and retry; the store never retries
    /// on their behalf.
    async fn append(&self, events: Vec<DomainEvent>) -> Result<()>;

    /// Returns events with `sequence_number > from`, ascending.
    ///
    /// Pass [`SequenceNumber::initial`] to read the whole stream.
    async fn events_for(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        from: SequenceNumber,
    ) -> Result<Vec<DomainEvent>>;

    /// Returns true if the aggregate stream has any events.
    async fn has_events(&self, aggregate_id: AggregateId, aggregate_type: &str) -> Result<bool>;

    /// Returns the id of the most recent event recorded for an instance,
    /// ordered by `(timestamp desc, sequence_number desc)`.
    ///
    /// Supports cross-aggregate "most recent activity" queries used by
    /// save-game bookkeeping.
    async fn latest_event_id(&self, instance_id: InstanceId) -> Result<Option<EventId>>;
}

/// Validates an append batch and returns the per-stream groups in input order.
///
/// The batch must be non-empty and each stream's sequence numbers must be
/// contiguous and increasing in input order. Continuity against the stored
/// stream head is checked by the implementation.
pub fn group_for_append(events: &[DomainEvent]) -> Result<Vec<(StreamKey, Vec<&DomainEvent>)>> {
    if events.is_empty() {
        return Err(EventStoreError::InvalidBatch(
            "cannot append an empty batch".to_string(),
        ));
    }

    let mut groups: Vec<(StreamKey, Vec<&DomainEvent>)> = Vec::new();
    for event in events {
        let key = (event.aggregate_id, event.aggregate_type.clone());
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, group)) => group.push(event),
            None => groups.push((key, vec![event])),
        }
    }

    for ((id, aggregate_type), group) in &groups {
        let mut expected = group[0].sequence_number;
        if expected < SequenceNumber::first() {
            return Err(EventStoreError::InvalidBatch(format!(
                "stream {aggregate_type}/{id} starts at sequence {expected}, sequences start at 1"
            )));
        }
        for event in group.iter().skip(1) {
            expected = expected.next();
            if event.sequence_number != expected {
                return Err(EventStoreError::InvalidBatch(format!(
                    "stream {aggregate_type}/{id} is not contiguous: expected {expected}, got {}",
                    event.sequence_number
                )));
            }
        }
    }

    Ok(groups)
}
