//! Shared identifier types used across the event-sourcing engine.

pub mod ids;

pub use ids::{AgentId, AggregateId, CharacterId, InstanceId, PartyId};
