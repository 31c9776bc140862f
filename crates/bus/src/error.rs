use thiserror::Error;

use event_store::EventId;

/// Transport-level failure reported by a message bus.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus rejected or lost the send.
    #[error("send to topic '{topic}' failed: {reason}")]
    SendFailed { topic: String, reason: String },
}

/// Failure of a publish batch after the retry budget is spent.
///
/// Non-fatal to the triggering command: the events are already durable in
/// the event store, so the repository logs this and carries on.
#[derive(Debug, Error)]
pub enum PublishError {
    /// All attempts for at least one event were exhausted.
    #[error("publish of event {event_id} to topic '{topic}' failed after {attempts} attempts")]
    RetriesExhausted {
        event_id: EventId,
        topic: String,
        attempts: u32,
    },

    /// The envelope could not be serialized.
    #[error("envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
