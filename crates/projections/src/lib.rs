//! Query side: projections fold published events into read models.
//!
//! Projections are decoupled from the write model by the bus: they see
//! [`bus::Envelope`]s, apply them idempotently, and rely on redelivery
//! when an event arrives before something it references.

pub mod consumer;
pub mod error;
pub mod projection;
pub mod read_model;

#[cfg(test)]
mod testing;

pub use consumer::ProjectionConsumer;
pub use error::ProjectionError;
pub use projection::Projection;
pub use read_model::{CharacterRow, GameReadModel, InstanceRow, PartyRow};
