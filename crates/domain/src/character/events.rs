use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use common::{CharacterId, InstanceId};

use crate::aggregate::GameEvent;
use crate::character::values::{
    Appearance, Attributes, CharacterName, Origin, Proficiency, SkillId,
};

/// A character came into existence with its full starting sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterCreated {
    pub character_id: CharacterId,
    pub instance_id: InstanceId,
    pub name: CharacterName,
    pub origin: Origin,
    pub attributes: Attributes,
    pub appearance: Appearance,
    /// Player-chosen focus skills, already folded into `skills`.
    pub focus_skills: Vec<SkillId>,
    /// Complete starting skill sheet (focus and origin bonuses applied).
    pub skills: BTreeMap<SkillId, Proficiency>,
}

/// A skill reached a new, higher rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTrained {
    pub skill: SkillId,
    pub proficiency: Proficiency,
}

/// The character's display name changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRenamed {
    pub name: CharacterName,
}

/// Events of the [`Character`](crate::character::Character) aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CharacterEvent {
    Created(CharacterCreated),
    SkillTrained(SkillTrained),
    Renamed(CharacterRenamed),
}

impl GameEvent for CharacterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CharacterEvent::Created(_) => "CharacterCreated",
            CharacterEvent::SkillTrained(_) => "SkillTrained",
            CharacterEvent::Renamed(_) => "CharacterRenamed",
        }
    }

    fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            CharacterEvent::Created(e) => serde_json::to_value(e),
            CharacterEvent::SkillTrained(e) => serde_json::to_value(e),
            CharacterEvent::Renamed(e) => serde_json::to_value(e),
        }
    }

    fn from_parts(
        event_type: &str,
        payload: &serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let event = match event_type {
            "CharacterCreated" => CharacterEvent::Created(serde_json::from_value(payload.clone())?),
            "SkillTrained" => CharacterEvent::SkillTrained(serde_json::from_value(payload.clone())?),
            "CharacterRenamed" => CharacterEvent::Renamed(serde_json::from_value(payload.clone())?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
