use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{AggregateId, InstanceId};

use crate::{
    DomainEvent, EventId, EventStoreError, Result, SequenceNumber, Snapshot, SnapshotStore,
    store::{EventStore, group_for_append},
};

/// In-memory event store used by tests and the default server wiring.
///
/// Provides the same contract as the PostgreSQL implementation, including
/// the optimistic-lock behavior on duplicate sequence numbers.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<DomainEvent>>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns every stored event in insertion order.
    pub async fn all_events(&self) -> Vec<DomainEvent> {
        self.events.read().await.clone()
    }

    /// Clears all events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<DomainEvent>) -> Result<()> {
        let groups = group_for_append(&events)?;

        let mut store = self.events.write().await;

        // Each group must continue its stream at current_max + 1. A batch
        // stamped against a stale stream head collides here exactly like the
        // unique constraint does in PostgreSQL; a batch starting past the
        // head is a caller bug, not a race.
        for ((aggregate_id, aggregate_type), group) in &groups {
            let current_max = store
                .iter()
                .filter(|e| e.aggregate_id == *aggregate_id && e.aggregate_type == *aggregate_type)
                .map(|e| e.sequence_number)
                .max()
                .unwrap_or(SequenceNumber::initial());

            let first = group[0].sequence_number;
            if first <= current_max {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: *aggregate_id,
                    aggregate_type: aggregate_type.clone(),
                    sequence: first,
                });
            }
            if first != current_max.next() {
                return Err(EventStoreError::InvalidBatch(format!(
                    "stream {aggregate_type}/{aggregate_id} would gap: head is {current_max}, batch starts at {first}"
                )));
            }
        }

        metrics::counter!("events_appended_total").increment(events.len() as u64);
        store.extend(events);
        Ok(())
    }

    async fn events_for(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        from: SequenceNumber,
    ) -> Result<Vec<DomainEvent>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| {
                e.aggregate_id == aggregate_id
                    && e.aggregate_type == aggregate_type
                    && e.sequence_number > from
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.sequence_number);
        Ok(events)
    }

    async fn has_events(&self, aggregate_id: AggregateId, aggregate_type: &str) -> Result<bool> {
        let store = self.events.read().await;
        Ok(store
            .iter()
            .any(|e| e.aggregate_id == aggregate_id && e.aggregate_type == aggregate_type))
    }

    async fn latest_event_id(&self, instance_id: InstanceId) -> Result<Option<EventId>> {
        let key = instance_id.to_string();
        let store = self.events.read().await;
        Ok(store
            .iter()
            .filter(|e| e.instance_meta() == Some(key.as_str()))
            .max_by_key(|e| (e.timestamp, e.sequence_number))
            .map(|e| e.event_id))
    }
}

/// In-memory snapshot store keyed by `(aggregate_id, aggregate_type)`.
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<(AggregateId, String), Snapshot>>>,
}

impl InMemorySnapshotStore {
    /// Creates a new empty snapshot store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live snapshots.
    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(
            (snapshot.aggregate_id, snapshot.aggregate_type.clone()),
            snapshot,
        );
        metrics::counter!("snapshots_written_total").increment(1);
        Ok(())
    }

    async fn find_latest(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&(aggregate_id, aggregate_type.to_string()))
            .cloned())
    }
}
