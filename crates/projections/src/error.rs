use thiserror::Error;

/// Failures while applying an event to a read model.
///
/// Retryable errors put the message back on the bus; fatal errors drop it
/// after logging, since redelivery would fail the same way forever.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The event references a row another aggregate's stream has not
    /// produced yet. Cross-partition arrival order is not guaranteed, so
    /// this resolves itself once the other stream catches up.
    #[error("{projection}: missing dependency: {detail}")]
    DependencyMissing {
        projection: &'static str,
        detail: String,
    },

    /// The payload of a known event type could not be decoded.
    #[error("payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ProjectionError {
    /// True when redelivering the message can succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProjectionError::DependencyMissing { .. })
    }
}
