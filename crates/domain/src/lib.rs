//! Write model: aggregates, commands, and the event-sourced repository.
//!
//! Aggregates are pure folds over their event streams. Commands validate
//! against current state and return the events to record; the repository
//! sequences them, persists them, publishes them, and snapshots the
//! aggregate when its stream grows long.

pub mod aggregate;
pub mod character;
pub mod error;
pub mod instance;
pub mod party;
pub mod repository;

pub use aggregate::{Aggregate, GameEvent};
pub use character::{Character, CharacterError, CharacterEvent};
pub use error::{DomainError, Result};
pub use instance::{Instance, InstanceCreated, InstanceEvent};
pub use party::{Party, PartyError, PartyEvent};
pub use repository::{
    DEFAULT_SNAPSHOT_THRESHOLD, EventContext, EventSourcedRepository,
};
