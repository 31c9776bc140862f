use serde::{Deserialize, Serialize};

use common::{AgentId, InstanceId};
use event_store::{AggregateId, SequenceNumber};

use crate::aggregate::{Aggregate, GameEvent};

/// A new playthrough was started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceCreated {
    pub instance_id: InstanceId,
    pub owner_agent_id: AgentId,
}

/// Events of the [`Instance`] aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstanceEvent {
    Created(InstanceCreated),
}

impl GameEvent for InstanceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InstanceEvent::Created(_) => "InstanceCreated",
        }
    }

    fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            InstanceEvent::Created(e) => serde_json::to_value(e),
        }
    }

    fn from_parts(
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        match event_type {
            "InstanceCreated" => serde_json::from_value(payload.clone())
                .map(InstanceEvent::Created)
                .map(Some),
            _ => Ok(None),
        }
    }
}

/// A game instance: one playthrough, owned by one agent.
///
/// Root of the per-playthrough event partition; every event recorded for
/// aggregates inside an instance carries this instance's id in metadata.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Instance {
    instance_id: Option<InstanceId>,
    owner_agent_id: Option<AgentId>,
    sequence: SequenceNumber,
}

impl Instance {
    /// Command: start a new playthrough.
    pub fn create(instance_id: InstanceId, owner_agent_id: AgentId) -> Vec<InstanceEvent> {
        vec![InstanceEvent::Created(InstanceCreated {
            instance_id,
            owner_agent_id,
        })]
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance_id
    }

    pub fn owner_agent_id(&self) -> Option<AgentId> {
        self.owner_agent_id
    }
}

impl Aggregate for Instance {
    type Event = InstanceEvent;
    const AGGREGATE_TYPE: &'static str = "Instance";

    fn id(&self) -> Option<AggregateId> {
        self.instance_id.map(|id| id.as_aggregate_id())
    }

    fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    fn set_sequence(&mut self, sequence: SequenceNumber) {
        self.sequence = sequence;
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InstanceEvent::Created(e) => {
                self.instance_id = Some(e.instance_id);
                self.owner_agent_id = Some(e.owner_agent_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_apply_sets_identity() {
        let instance_id = InstanceId::new();
        let owner = AgentId::new();

        let mut instance = Instance::default();
        for event in Instance::create(instance_id, owner) {
            instance.apply(&event);
        }

        assert_eq!(instance.instance_id(), Some(instance_id));
        assert_eq!(instance.owner_agent_id(), Some(owner));
        assert_eq!(instance.id(), Some(instance_id.as_aggregate_id()));
    }

    #[test]
    fn event_roundtrips_through_parts() {
        let event = InstanceEvent::Created(InstanceCreated {
            instance_id: InstanceId::new(),
            owner_agent_id: AgentId::system(),
        });

        let payload = event.payload().unwrap();
        let back = InstanceEvent::from_parts(event.event_type(), &payload)
            .unwrap()
            .unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn unknown_event_type_decodes_to_none() {
        let decoded =
            InstanceEvent::from_parts("InstanceArchived", &serde_json::json!({})).unwrap();
        assert!(decoded.is_none());
    }
}
