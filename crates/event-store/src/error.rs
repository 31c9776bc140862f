use thiserror::Error;

use common::AggregateId;

use crate::SequenceNumber;

/// Errors that can occur when interacting with the event store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Another writer appended to the same stream first.
    ///
    /// Recoverable: the caller must reload the aggregate and retry the whole
    /// command. The store never retries internally because the aggregate
    /// state that produced the batch is stale.
    #[error(
        "concurrency conflict for {aggregate_type}/{aggregate_id}: sequence {sequence} already exists"
    )]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        aggregate_type: String,
        sequence: SequenceNumber,
    },

    /// The batch handed to `append` is malformed (empty, or sequence numbers
    /// not contiguous within an aggregate group).
    #[error("invalid append batch: {0}")]
    InvalidBatch(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
