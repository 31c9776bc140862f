use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::{CharacterId, InstanceId, PartyId};
use event_store::{AggregateId, SequenceNumber};

use crate::aggregate::{Aggregate, GameEvent};

/// A party was formed around a protagonist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyCreated {
    pub party_id: PartyId,
    pub instance_id: InstanceId,
    pub protagonist_id: CharacterId,
}

/// A character joined the party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMemberAdded {
    pub character_id: CharacterId,
}

/// A character left the party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyMemberRemoved {
    pub character_id: CharacterId,
}

/// Events of the [`Party`] aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PartyEvent {
    Created(PartyCreated),
    MemberAdded(PartyMemberAdded),
    MemberRemoved(PartyMemberRemoved),
}

impl GameEvent for PartyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PartyEvent::Created(_) => "PartyCreated",
            PartyEvent::MemberAdded(_) => "PartyMemberAdded",
            PartyEvent::MemberRemoved(_) => "PartyMemberRemoved",
        }
    }

    fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            PartyEvent::Created(e) => serde_json::to_value(e),
            PartyEvent::MemberAdded(e) => serde_json::to_value(e),
            PartyEvent::MemberRemoved(e) => serde_json::to_value(e),
        }
    }

    fn from_parts(
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let event = match event_type {
            "PartyCreated" => PartyEvent::Created(serde_json::from_value(payload.clone())?),
            "PartyMemberAdded" => PartyEvent::MemberAdded(serde_json::from_value(payload.clone())?),
            "PartyMemberRemoved" => {
                PartyEvent::MemberRemoved(serde_json::from_value(payload.clone())?)
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Command rejections for the party aggregate.
#[derive(Debug, Error, PartialEq)]
pub enum PartyError {
    #[error("party has not been created yet")]
    NotCreated,

    #[error("the protagonist cannot be removed from the party")]
    CannotRemoveProtagonist,

    #[error("character {0} is not a member of this party")]
    NotAMember(CharacterId),
}

/// The group of characters the player controls in one instance.
///
/// Membership is a set: adding an existing member or the protagonist is a
/// no-op rather than an error, so retried commands converge.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Party {
    party_id: Option<PartyId>,
    instance_id: Option<InstanceId>,
    protagonist_id: Option<CharacterId>,
    members: BTreeSet<CharacterId>,
    sequence: SequenceNumber,
}

impl Party {
    /// Command: form a party around its protagonist.
    pub fn create(
        party_id: PartyId,
        instance_id: InstanceId,
        protagonist_id: CharacterId,
    ) -> Vec<PartyEvent> {
        vec![PartyEvent::Created(PartyCreated {
            party_id,
            instance_id,
            protagonist_id,
        })]
    }

    /// Command: add a companion. No-op if already a member.
    pub fn add_member(&self, character_id: CharacterId) -> Result<Vec<PartyEvent>, PartyError> {
        if self.party_id.is_none() {
            return Err(PartyError::NotCreated);
        }
        if self.members.contains(&character_id) {
            return Ok(vec![]);
        }
        Ok(vec![PartyEvent::MemberAdded(PartyMemberAdded {
            character_id,
        })])
    }

    /// Command: remove a companion. The protagonist never leaves.
    pub fn remove_member(&self, character_id: CharacterId) -> Result<Vec<PartyEvent>, PartyError> {
        if self.party_id.is_none() {
            return Err(PartyError::NotCreated);
        }
        if self.protagonist_id == Some(character_id) {
            return Err(PartyError::CannotRemoveProtagonist);
        }
        if !self.members.contains(&character_id) {
            return Err(PartyError::NotAMember(character_id));
        }
        Ok(vec![PartyEvent::MemberRemoved(PartyMemberRemoved {
            character_id,
        })])
    }

    pub fn party_id(&self) -> Option<PartyId> {
        self.party_id
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance_id
    }

    pub fn protagonist_id(&self) -> Option<CharacterId> {
        self.protagonist_id
    }

    pub fn members(&self) -> &BTreeSet<CharacterId> {
        &self.members
    }
}

impl Aggregate for Party {
    type Event = PartyEvent;
    const AGGREGATE_TYPE: &'static str = "Party";

    fn id(&self) -> Option<AggregateId> {
        self.party_id.map(|id| id.as_aggregate_id())
    }

    fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    fn set_sequence(&mut self, sequence: SequenceNumber) {
        self.sequence = sequence;
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PartyEvent::Created(e) => {
                self.party_id = Some(e.party_id);
                self.instance_id = Some(e.instance_id);
                self.protagonist_id = Some(e.protagonist_id);
                self.members.insert(e.protagonist_id);
            }
            PartyEvent::MemberAdded(e) => {
                self.members.insert(e.character_id);
            }
            PartyEvent::MemberRemoved(e) => {
                self.members.remove(&e.character_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_party() -> (Party, CharacterId) {
        let protagonist = CharacterId::new();
        let mut party = Party::default();
        for event in Party::create(PartyId::new(), InstanceId::new(), protagonist) {
            party.apply(&event);
        }
        (party, protagonist)
    }

    #[test]
    fn creation_seats_the_protagonist() {
        let (party, protagonist) = created_party();
        assert_eq!(party.protagonist_id(), Some(protagonist));
        assert!(party.members().contains(&protagonist));
    }

    #[test]
    fn adding_a_member_twice_is_a_noop() {
        let (mut party, _) = created_party();
        let companion = CharacterId::new();

        let events = party.add_member(companion).unwrap();
        assert_eq!(events.len(), 1);
        for event in &events {
            party.apply(event);
        }

        assert!(party.add_member(companion).unwrap().is_empty());
        assert_eq!(party.members().len(), 2);
    }

    #[test]
    fn adding_the_protagonist_again_is_a_noop() {
        let (party, protagonist) = created_party();
        assert!(party.add_member(protagonist).unwrap().is_empty());
    }

    #[test]
    fn protagonist_cannot_be_removed() {
        let (party, protagonist) = created_party();
        assert_eq!(
            party.remove_member(protagonist),
            Err(PartyError::CannotRemoveProtagonist)
        );
    }

    #[test]
    fn removing_a_non_member_fails() {
        let (party, _) = created_party();
        let stranger = CharacterId::new();
        assert_eq!(
            party.remove_member(stranger),
            Err(PartyError::NotAMember(stranger))
        );
    }

    #[test]
    fn commands_on_an_uncreated_party_fail() {
        let party = Party::default();
        assert_eq!(
            party.add_member(CharacterId::new()),
            Err(PartyError::NotCreated)
        );
    }

    #[test]
    fn replay_is_deterministic() {
        let protagonist = CharacterId::new();
        let companion = CharacterId::new();
        let events = vec![
            PartyEvent::Created(PartyCreated {
                party_id: PartyId::new(),
                instance_id: InstanceId::new(),
                protagonist_id: protagonist,
            }),
            PartyEvent::MemberAdded(PartyMemberAdded {
                character_id: companion,
            }),
            PartyEvent::MemberRemoved(PartyMemberRemoved {
                character_id: companion,
            }),
        ];

        let mut first = Party::default();
        let mut second = Party::default();
        for event in &events {
            first.apply(event);
            second.apply(event);
        }

        assert_eq!(first.members(), second.members());
        assert_eq!(first.members().len(), 1);
    }
}
