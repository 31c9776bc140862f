use async_trait::async_trait;

use bus::Envelope;

use crate::error::ProjectionError;

/// A read-model updater fed from the message bus.
///
/// `handle` must be idempotent: the bus is at-least-once, so the same
/// envelope can arrive more than once and must converge to the same state.
/// Events a projection does not care about are `Ok(())`, not errors.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Stable name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    async fn handle(&self, envelope: &Envelope) -> Result<(), ProjectionError>;
}
