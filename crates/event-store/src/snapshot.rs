use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::AggregateId;

use crate::{Result, SequenceNumber};

/// A cached materialization of an aggregate's state at a known sequence.
///
/// At most one live snapshot exists per `(aggregate_id, aggregate_type)`;
/// saving replaces the previous one. A snapshot's sequence number never
/// exceeds the stream's true maximum, so replaying events with
/// `sequence_number > snapshot.sequence_number` on top of the restored
/// state is always safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// The aggregate this snapshot belongs to.
    pub aggregate_id: AggregateId,

    /// The kind of aggregate (e.g. "Party").
    pub aggregate_type: String,

    /// Stream position the state was captured at.
    pub sequence_number: SequenceNumber,

    /// The serialized aggregate state.
    pub state: serde_json::Value,

    /// When the snapshot was created.
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a new snapshot from raw state.
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: SequenceNumber,
        state: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            state,
            created_at: Utc::now(),
        }
    }

    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        sequence_number: SequenceNumber,
        state: &T,
    ) -> Result<Self> {
        Ok(Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            state: serde_json::to_value(state)?,
            created_at: Utc::now(),
        })
    }

    /// Deserializes the snapshot state into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T> {
        Ok(serde_json::from_value(self.state)?)
    }
}

/// Latest-state cache per aggregate, bounding replay cost.
///
/// Last-writer-wins; no snapshot history is retained.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Upserts the snapshot keyed by `(aggregate_id, aggregate_type)`.
    async fn save(&self, snapshot: Snapshot) -> Result<()>;

    /// Returns the latest snapshot for an aggregate, if one exists.
    async fn find_latest(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
    ) -> Result<Option<Snapshot>>;
}
