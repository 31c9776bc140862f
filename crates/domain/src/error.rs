use thiserror::Error;

use common::AggregateId;
use event_store::EventStoreError;

/// Errors surfaced by the repository layer.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No stream (and no snapshot) exists for the requested aggregate.
    #[error("{aggregate_type} {aggregate_id} not found")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// An aggregate was saved before any event assigned it an identity.
    #[error("{aggregate_type} has no id; apply a creation event before saving")]
    MissingAggregateId { aggregate_type: &'static str },

    /// The underlying event store failed.
    ///
    /// [`EventStoreError::ConcurrencyConflict`] means another writer got
    /// there first: discard the in-memory aggregate, reload, and retry the
    /// command.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),

    /// Event payload or snapshot state could not be (de)serialized.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True when the caller should reload the aggregate and retry.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
