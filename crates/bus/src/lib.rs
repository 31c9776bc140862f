//! Asynchronous event publishing onto a partitioned message bus.
//!
//! Delivery guarantees: at-least-once, ordered only within a partition key,
//! and no transactional atomicity with the event store. Events are durable
//! before they are published; a lost publish can lag the read side until
//! redelivered or reconciled.

pub mod bus;
pub mod envelope;
pub mod error;
pub mod publisher;
pub mod topic;

pub use bus::{Delivery, InMemoryMessageBus, MessageBus, TopicSubscription};
pub use envelope::Envelope;
pub use error::{BusError, PublishError};
pub use publisher::{BusPublisher, EventPublisher, PublisherConfig};
pub use topic::TopicMap;
