use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use common::{CharacterId, InstanceId};
use event_store::{AggregateId, SequenceNumber};

use crate::aggregate::Aggregate;
use crate::character::events::{
    CharacterCreated, CharacterEvent, CharacterRenamed, SkillTrained,
};
use crate::character::values::{
    Appearance, Attributes, CharacterName, Origin, Proficiency, SkillId,
};

/// Command rejections for the character aggregate.
#[derive(Debug, Error, PartialEq)]
pub enum CharacterError {
    #[error("character has not been created yet")]
    NotCreated,

    #[error("skill '{skill}' is already at {current}, training to {target} is not an improvement")]
    NoImprovement {
        skill: SkillId,
        current: Proficiency,
        target: Proficiency,
    },
}

/// A playable or companion character.
///
/// The starting skill sheet is fixed at creation: focus skills start at
/// [`Proficiency::FOCUS`], the origin's bonus skills at
/// [`Proficiency::ORIGIN_BONUS`] unless they are also focus skills, and
/// everything else at zero. Training only ever raises a rating.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Character {
    character_id: Option<CharacterId>,
    instance_id: Option<InstanceId>,
    name: Option<CharacterName>,
    origin: Option<Origin>,
    attributes: Option<Attributes>,
    appearance: Option<Appearance>,
    skills: BTreeMap<SkillId, Proficiency>,
    sequence: SequenceNumber,
}

impl Character {
    /// Command: create a character with its full starting sheet.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        character_id: CharacterId,
        instance_id: InstanceId,
        name: CharacterName,
        origin: Origin,
        attributes: Attributes,
        appearance: Appearance,
        focus_skills: Vec<SkillId>,
    ) -> Vec<CharacterEvent> {
        let mut skills = BTreeMap::new();
        for skill in origin.bonus_skills() {
            skills.insert(skill, Proficiency::ORIGIN_BONUS);
        }
        // Focus overrides an overlapping origin bonus.
        for skill in &focus_skills {
            skills.insert(skill.clone(), Proficiency::FOCUS);
        }

        vec![CharacterEvent::Created(CharacterCreated {
            character_id,
            instance_id,
            name,
            origin,
            attributes,
            appearance,
            focus_skills,
            skills,
        })]
    }

    /// Command: raise a skill to a new rating.
    pub fn train_skill(
        &self,
        skill: SkillId,
        proficiency: Proficiency,
    ) -> Result<Vec<CharacterEvent>, CharacterError> {
        if self.character_id.is_none() {
            return Err(CharacterError::NotCreated);
        }
        let current = self.skill(&skill);
        if proficiency <= current {
            return Err(CharacterError::NoImprovement {
                skill,
                current,
                target: proficiency,
            });
        }
        Ok(vec![CharacterEvent::SkillTrained(SkillTrained {
            skill,
            proficiency,
        })])
    }

    /// Command: change the display name. No-op if unchanged.
    pub fn rename(&self, name: CharacterName) -> Result<Vec<CharacterEvent>, CharacterError> {
        if self.character_id.is_none() {
            return Err(CharacterError::NotCreated);
        }
        if self.name.as_ref() == Some(&name) {
            return Ok(vec![]);
        }
        Ok(vec![CharacterEvent::Renamed(CharacterRenamed { name })])
    }

    pub fn character_id(&self) -> Option<CharacterId> {
        self.character_id
    }

    pub fn instance_id(&self) -> Option<InstanceId> {
        self.instance_id
    }

    pub fn name(&self) -> Option<&CharacterName> {
        self.name.as_ref()
    }

    pub fn origin(&self) -> Option<Origin> {
        self.origin
    }

    pub fn attributes(&self) -> Option<&Attributes> {
        self.attributes.as_ref()
    }

    pub fn appearance(&self) -> Option<&Appearance> {
        self.appearance.as_ref()
    }

    /// Current rating of a skill; untrained skills rate zero.
    pub fn skill(&self, skill: &SkillId) -> Proficiency {
        self.skills.get(skill).copied().unwrap_or_default()
    }

    pub fn skills(&self) -> &BTreeMap<SkillId, Proficiency> {
        &self.skills
    }
}

impl Aggregate for Character {
    type Event = CharacterEvent;
    const AGGREGATE_TYPE: &'static str = "Character";

    fn id(&self) -> Option<AggregateId> {
        self.character_id.map(|id| id.as_aggregate_id())
    }

    fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    fn set_sequence(&mut self, sequence: SequenceNumber) {
        self.sequence = sequence;
    }

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CharacterEvent::Created(e) => {
                self.character_id = Some(e.character_id);
                self.instance_id = Some(e.instance_id);
                self.name = Some(e.name.clone());
                self.origin = Some(e.origin);
                self.attributes = Some(e.attributes);
                self.appearance = Some(e.appearance.clone());
                self.skills = e.skills.clone();
            }
            CharacterEvent::SkillTrained(e) => {
                self.skills.insert(e.skill.clone(), e.proficiency);
            }
            CharacterEvent::Renamed(e) => {
                self.name = Some(e.name.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::GameEvent;

    fn attributes() -> Attributes {
        Attributes {
            strength: 5,
            agility: 6,
            endurance: 5,
            intellect: 7,
            charisma: 4,
            luck: 5,
        }
    }

    fn appearance() -> Appearance {
        Appearance {
            gender: crate::character::values::Gender::Female,
            body_type: crate::character::values::BodyType::Average,
        }
    }

    fn created(origin: Origin, focus: Vec<SkillId>) -> Character {
        let mut character = Character::default();
        let events = Character::create(
            CharacterId::new(),
            InstanceId::new(),
            CharacterName::new("Vex").unwrap(),
            origin,
            attributes(),
            appearance(),
            focus,
        );
        for event in events {
            character.apply(&event);
        }
        character
    }

    #[test]
    fn origin_bonus_skills_start_at_fifteen() {
        let character = created(Origin::Wastelander, vec![]);
        assert_eq!(
            character.skill(&SkillId::from("scavenging")),
            Proficiency::ORIGIN_BONUS
        );
        assert_eq!(
            character.skill(&SkillId::from("tracking")),
            Proficiency::ORIGIN_BONUS
        );
        assert_eq!(
            character.skill(&SkillId::from("mechanics")),
            Proficiency::default()
        );
    }

    #[test]
    fn focus_skills_start_at_twenty() {
        let character = created(Origin::Wastelander, vec![SkillId::from("barter")]);
        assert_eq!(character.skill(&SkillId::from("barter")), Proficiency::FOCUS);
    }

    #[test]
    fn focus_overrides_overlapping_origin_bonus() {
        let character = created(Origin::VaultDweller, vec![SkillId::from("mechanics")]);
        assert_eq!(
            character.skill(&SkillId::from("mechanics")),
            Proficiency::FOCUS
        );
        assert_eq!(
            character.skill(&SkillId::from("electronics")),
            Proficiency::ORIGIN_BONUS
        );
    }

    #[test]
    fn training_raises_a_skill() {
        let mut character = created(Origin::RiftTouched, vec![]);
        let target = Proficiency::new(40).unwrap();

        let events = character
            .train_skill(SkillId::from("perception"), target)
            .unwrap();
        for event in &events {
            character.apply(event);
        }

        assert_eq!(character.skill(&SkillId::from("perception")), target);
    }

    #[test]
    fn training_below_current_rating_is_rejected() {
        let character = created(Origin::RiftTouched, vec![]);
        let err = character
            .train_skill(SkillId::from("perception"), Proficiency::new(10).unwrap())
            .unwrap_err();
        assert!(matches!(err, CharacterError::NoImprovement { .. }));
    }

    #[test]
    fn rename_to_same_name_is_a_noop() {
        let character = created(Origin::VaultDweller, vec![]);
        assert!(character
            .rename(CharacterName::new("Vex").unwrap())
            .unwrap()
            .is_empty());

        let events = character.rename(CharacterName::new("Ash").unwrap()).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn commands_on_an_uncreated_character_fail() {
        let character = Character::default();
        assert_eq!(
            character.train_skill(SkillId::from("mechanics"), Proficiency::FOCUS),
            Err(CharacterError::NotCreated)
        );
    }

    #[test]
    fn created_event_roundtrips_through_parts() {
        let events = Character::create(
            CharacterId::new(),
            InstanceId::new(),
            CharacterName::new("Vex").unwrap(),
            Origin::RiftTouched,
            attributes(),
            appearance(),
            vec![SkillId::from("stealth")],
        );

        let event = &events[0];
        let payload = event.payload().unwrap();
        let back = CharacterEvent::from_parts(event.event_type(), &payload)
            .unwrap()
            .unwrap();
        assert_eq!(&back, event);
    }
}
