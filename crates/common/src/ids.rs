//! UUID-backed identifier newtypes.
//!
//! Each identifier wraps a UUID to prevent mixing up different kinds of
//! ids at compile time. All of them serialize transparently as the raw
//! UUID string.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for an aggregate instance.
    ///
    /// Every event-sourced entity (instance, party, character) is addressed
    /// by one of these in the event store.
    AggregateId
}

uuid_id! {
    /// Identifier for a game instance (a playthrough).
    InstanceId
}

uuid_id! {
    /// Identifier for the agent (player or system) that caused an event.
    AgentId
}

uuid_id! {
    /// Identifier for a party aggregate.
    PartyId
}

uuid_id! {
    /// Identifier for a character aggregate.
    CharacterId
}

impl AgentId {
    /// The all-zero agent used for system-initiated events.
    ///
    /// Event metadata may carry the literal string `"system"` instead of a
    /// UUID; [`AgentId::parse_meta`] maps it onto this sentinel.
    pub fn system() -> Self {
        Self(Uuid::nil())
    }

    /// Parses an agent id from event metadata.
    ///
    /// Accepts a UUID string or the `"system"` sentinel. Anything else also
    /// falls back to the system agent rather than failing the event.
    pub fn parse_meta(value: &str) -> Self {
        if value == "system" {
            return Self::system();
        }
        Uuid::parse_str(value).map(Self).unwrap_or_else(|_| Self::system())
    }
}

impl InstanceId {
    /// Returns this instance id as a generic aggregate id.
    pub fn as_aggregate_id(&self) -> AggregateId {
        AggregateId::from_uuid(self.0)
    }
}

impl PartyId {
    /// Returns this party id as a generic aggregate id.
    pub fn as_aggregate_id(&self) -> AggregateId {
        AggregateId::from_uuid(self.0)
    }
}

impl CharacterId {
    /// Returns this character id as a generic aggregate id.
    pub fn as_aggregate_id(&self) -> AggregateId {
        AggregateId::from_uuid(self.0)
    }
}
