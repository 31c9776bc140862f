//! Envelope builders shared by the tests in this crate.

pub mod envelopes {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use bus::Envelope;
    use common::{AgentId, CharacterId, InstanceId, PartyId};
    use domain::GameEvent;
    use domain::character::{
        Appearance, Attributes, BodyType, CharacterName, CharacterRenamed, Gender, Origin,
        Proficiency, SkillId, SkillTrained,
    };
    use domain::instance::InstanceCreated;
    use domain::party::{PartyCreated, PartyMemberAdded};
    use event_store::{AggregateId, EventId, SequenceNumber};

    pub fn of_type(event_type: &str, payload: serde_json::Value) -> Envelope {
        Envelope {
            event_id: EventId::new(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            aggregate_id: AggregateId::new(),
            aggregate_type: "Unknown".to_string(),
            sequence_number: SequenceNumber::first(),
            payload,
            metadata: BTreeMap::new(),
        }
    }

    fn envelope(
        aggregate_id: AggregateId,
        aggregate_type: &str,
        event_type: &str,
        payload: serde_json::Value,
        instance_id: Option<InstanceId>,
    ) -> Envelope {
        let mut metadata = BTreeMap::new();
        if let Some(instance_id) = instance_id {
            metadata.insert("instance_id".to_string(), instance_id.to_string());
        }
        Envelope {
            event_id: EventId::new(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            aggregate_id,
            aggregate_type: aggregate_type.to_string(),
            sequence_number: SequenceNumber::first(),
            payload,
            metadata,
        }
    }

    pub fn instance_created(instance_id: InstanceId, owner: AgentId) -> Envelope {
        let event = domain::InstanceEvent::Created(InstanceCreated {
            instance_id,
            owner_agent_id: owner,
        });
        envelope(
            instance_id.as_aggregate_id(),
            "Instance",
            event.event_type(),
            event.payload().unwrap(),
            Some(instance_id),
        )
    }

    pub fn party_created(
        party_id: PartyId,
        instance_id: InstanceId,
        protagonist_id: CharacterId,
    ) -> Envelope {
        let event = domain::PartyEvent::Created(PartyCreated {
            party_id,
            instance_id,
            protagonist_id,
        });
        envelope(
            party_id.as_aggregate_id(),
            "Party",
            event.event_type(),
            event.payload().unwrap(),
            Some(instance_id),
        )
    }

    pub fn member_added(party_id: PartyId, character_id: CharacterId) -> Envelope {
        let event = domain::PartyEvent::MemberAdded(PartyMemberAdded { character_id });
        envelope(
            party_id.as_aggregate_id(),
            "Party",
            event.event_type(),
            event.payload().unwrap(),
            None,
        )
    }

    pub fn character_created(
        character_id: CharacterId,
        instance_id: InstanceId,
        name: &str,
        origin: Origin,
    ) -> Envelope {
        let events = domain::Character::create(
            character_id,
            instance_id,
            CharacterName::new(name).unwrap(),
            origin,
            Attributes {
                strength: 5,
                agility: 5,
                endurance: 5,
                intellect: 5,
                charisma: 5,
                luck: 5,
            },
            Appearance {
                gender: Gender::Nonbinary,
                body_type: BodyType::Average,
            },
            vec![],
        );
        let event = &events[0];
        envelope(
            character_id.as_aggregate_id(),
            "Character",
            event.event_type(),
            event.payload().unwrap(),
            Some(instance_id),
        )
    }

    pub fn skill_trained(character_id: CharacterId, skill: &str, value: u8) -> Envelope {
        let event = domain::CharacterEvent::SkillTrained(SkillTrained {
            skill: SkillId::from(skill),
            proficiency: Proficiency::new(value).unwrap(),
        });
        envelope(
            character_id.as_aggregate_id(),
            "Character",
            event.event_type(),
            event.payload().unwrap(),
            None,
        )
    }

    pub fn renamed(character_id: CharacterId, name: &str) -> Envelope {
        let event = domain::CharacterEvent::Renamed(CharacterRenamed {
            name: CharacterName::new(name).unwrap(),
        });
        envelope(
            character_id.as_aggregate_id(),
            "Character",
            event.event_type(),
            event.payload().unwrap(),
            None,
        )
    }
}
