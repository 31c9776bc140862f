//! Durable, append-only event log with per-aggregate sequencing.
//!
//! The event store owns ordering and durability of each aggregate stream.
//! Sequence numbers are gapless and duplicate-free; a duplicate
//! `(aggregate_id, aggregate_type, sequence_number)` tuple is the optimistic
//! concurrency signal and surfaces as [`EventStoreError::ConcurrencyConflict`].

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod snapshot;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{DomainEvent, DomainEventBuilder, EventId, SequenceNumber};
pub use memory::{InMemoryEventStore, InMemorySnapshotStore};
pub use postgres::{PostgresEventStore, PostgresSnapshotStore};
pub use snapshot::{Snapshot, SnapshotStore};
pub use store::EventStore;
