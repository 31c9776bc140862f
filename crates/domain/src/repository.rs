use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;

use common::{AgentId, InstanceId};
use event_store::event::{META_AGENT_ID, META_INSTANCE_ID};
use event_store::{
    AggregateId, DomainEvent, EventId, EventStore, SequenceNumber, Snapshot, SnapshotStore,
};

use bus::EventPublisher;

use crate::aggregate::{Aggregate, GameEvent};
use crate::error::{DomainError, Result};

/// Default snapshot cadence: one snapshot per hundred events.
pub const DEFAULT_SNAPSHOT_THRESHOLD: i64 = 100;

/// Who caused a command, and which playthrough it belongs to.
///
/// Stamped into event metadata so the publisher can partition by instance
/// and projections can attribute changes to an agent.
#[derive(Debug, Clone, Copy)]
pub struct EventContext {
    pub instance_id: Option<InstanceId>,
    pub agent_id: AgentId,
}

impl EventContext {
    /// Context for a player-initiated command within an instance.
    pub fn new(instance_id: InstanceId, agent_id: AgentId) -> Self {
        Self {
            instance_id: Some(instance_id),
            agent_id,
        }
    }

    /// Context for a system-initiated command within an instance.
    pub fn system(instance_id: InstanceId) -> Self {
        Self::new(instance_id, AgentId::system())
    }

    /// Context for a command with no owning instance.
    ///
    /// Events saved with this context partition by aggregate id, which
    /// drops cross-aggregate ordering; use only for aggregates that truly
    /// live outside any playthrough.
    pub fn without_instance(agent_id: AgentId) -> Self {
        Self {
            instance_id: None,
            agent_id,
        }
    }

    fn agent_meta(&self) -> String {
        if self.agent_id == AgentId::system() {
            "system".to_string()
        } else {
            self.agent_id.to_string()
        }
    }
}

/// Loads aggregates by replay and saves command results.
///
/// One repository per aggregate type; the store, snapshot store, and
/// publisher are shared across all of them. Save order is fixed: append
/// durably, fold into the aggregate, publish best-effort, snapshot
/// best-effort. Only the append can fail the save.
pub struct EventSourcedRepository<A: Aggregate> {
    store: Arc<dyn EventStore>,
    snapshots: Arc<dyn SnapshotStore>,
    publisher: Arc<dyn EventPublisher>,
    snapshot_threshold: i64,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: Aggregate> EventSourcedRepository<A> {
    pub fn new(
        store: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            snapshots,
            publisher,
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
            _aggregate: PhantomData,
        }
    }

    /// Overrides the snapshot cadence. Zero disables snapshotting.
    pub fn with_snapshot_threshold(mut self, threshold: i64) -> Self {
        self.snapshot_threshold = threshold;
        self
    }

    /// Loads an aggregate, or `None` if it has never been created.
    ///
    /// Starts from the latest snapshot when one exists and replays only the
    /// tail of the stream past it. Events of unknown type are skipped.
    #[tracing::instrument(skip(self), fields(aggregate_type = A::AGGREGATE_TYPE))]
    pub async fn find(&self, aggregate_id: AggregateId) -> Result<Option<A>> {
        let snapshot = self
            .snapshots
            .find_latest(aggregate_id, A::AGGREGATE_TYPE)
            .await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => {
                let sequence = snapshot.sequence_number;
                let mut aggregate: A = snapshot.into_state()?;
                aggregate.set_sequence(sequence);
                aggregate
            }
            None => A::default(),
        };

        let from = aggregate.sequence();
        let events = self
            .store
            .events_for(aggregate_id, A::AGGREGATE_TYPE, from)
            .await?;

        if from == SequenceNumber::initial() && events.is_empty() {
            return Ok(None);
        }

        for record in &events {
            match A::Event::from_parts(&record.event_type, &record.payload)? {
                Some(event) => aggregate.apply(&event),
                None => {
                    tracing::debug!(
                        aggregate_type = A::AGGREGATE_TYPE,
                        %aggregate_id,
                        event_type = %record.event_type,
                        "skipping event of unknown type during replay"
                    );
                }
            }
            aggregate.set_sequence(record.sequence_number);
        }

        Ok(Some(aggregate))
    }

    /// Loads an aggregate, failing if it does not exist.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A> {
        self.find(aggregate_id)
            .await?
            .ok_or(DomainError::AggregateNotFound {
                aggregate_type: A::AGGREGATE_TYPE,
                aggregate_id,
            })
    }

    /// Records the outcome of a command.
    ///
    /// Folds `events` into the aggregate, appends them durably with
    /// sequence numbers continuing the aggregate's stream, then publishes
    /// and snapshots. A concurrency conflict from the append leaves the
    /// store untouched; the caller discards the aggregate and retries.
    /// Publish and snapshot failures are logged, never propagated.
    #[tracing::instrument(
        skip(self, aggregate, events, ctx),
        fields(aggregate_type = A::AGGREGATE_TYPE, events = events.len())
    )]
    pub async fn save(
        &self,
        aggregate: &mut A,
        events: Vec<A::Event>,
        ctx: &EventContext,
    ) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let base = aggregate.sequence();
        aggregate.apply_all(&events);
        let aggregate_id = aggregate.id().ok_or(DomainError::MissingAggregateId {
            aggregate_type: A::AGGREGATE_TYPE,
        })?;

        let mut metadata = BTreeMap::new();
        metadata.insert(META_AGENT_ID.to_string(), ctx.agent_meta());
        if let Some(instance_id) = ctx.instance_id {
            metadata.insert(META_INSTANCE_ID.to_string(), instance_id.to_string());
        }

        let mut records = Vec::with_capacity(events.len());
        let mut sequence = base;
        for event in &events {
            sequence = sequence.next();
            records.push(DomainEvent {
                event_id: EventId::new(),
                event_type: event.event_type().to_string(),
                timestamp: Utc::now(),
                aggregate_id,
                aggregate_type: A::AGGREGATE_TYPE.to_string(),
                sequence_number: sequence,
                payload: event.payload()?,
                metadata: metadata.clone(),
            });
        }

        self.store.append(records.clone()).await?;
        aggregate.set_sequence(sequence);

        if let Err(e) = self.publisher.publish(&records).await {
            tracing::error!(
                aggregate_type = A::AGGREGATE_TYPE,
                %aggregate_id,
                "events persisted but publish failed, projections will lag: {e}"
            );
        }

        self.maybe_snapshot(aggregate, aggregate_id, base, sequence)
            .await;

        Ok(())
    }

    /// Writes a snapshot when the batch crossed a threshold boundary.
    async fn maybe_snapshot(
        &self,
        aggregate: &A,
        aggregate_id: AggregateId,
        base: SequenceNumber,
        current: SequenceNumber,
    ) {
        if self.snapshot_threshold <= 0 {
            return;
        }
        if base.as_i64() / self.snapshot_threshold == current.as_i64() / self.snapshot_threshold {
            return;
        }

        let snapshot =
            match Snapshot::from_state(aggregate_id, A::AGGREGATE_TYPE, current, aggregate) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::warn!(
                        aggregate_type = A::AGGREGATE_TYPE,
                        %aggregate_id,
                        "failed to serialize snapshot state: {e}"
                    );
                    return;
                }
            };

        match self.snapshots.save(snapshot).await {
            Ok(()) => {
                tracing::debug!(
                    aggregate_type = A::AGGREGATE_TYPE,
                    %aggregate_id,
                    sequence = %current,
                    "wrote snapshot"
                );
            }
            // Replay from the previous snapshot still works, just slower.
            Err(e) => {
                tracing::warn!(
                    aggregate_type = A::AGGREGATE_TYPE,
                    %aggregate_id,
                    "failed to save snapshot: {e}"
                );
            }
        }
    }
}
