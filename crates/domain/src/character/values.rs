use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for character value types.
#[derive(Debug, Error, PartialEq)]
pub enum ValueError {
    #[error("character name cannot be empty")]
    EmptyName,

    #[error("character name exceeds {max} characters")]
    NameTooLong { max: usize },

    #[error("proficiency {0} exceeds the maximum of {max}", max = Proficiency::MAX)]
    ProficiencyOutOfRange(u8),
}

/// A character's display name, non-empty and bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterName(String);

impl CharacterName {
    pub const MAX_LEN: usize = 60;

    /// Validates and normalizes a name (surrounding whitespace is dropped).
    pub fn new(name: impl Into<String>) -> Result<Self, ValueError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(ValueError::EmptyName);
        }
        if name.chars().count() > Self::MAX_LEN {
            return Err(ValueError::NameTooLong { max: Self::MAX_LEN });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CharacterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier for a skill, e.g. `"mechanics"` or `"rift_manipulation"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkillId(String);

impl SkillId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SkillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SkillId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Skill rating on a 0 to 100 scale.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Proficiency(u8);

impl Proficiency {
    pub const MAX: u8 = 100;

    /// Starting rating for an origin's bonus skills.
    pub const ORIGIN_BONUS: Proficiency = Proficiency(15);

    /// Starting rating for a player-chosen focus skill.
    pub const FOCUS: Proficiency = Proficiency(20);

    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > Self::MAX {
            return Err(ValueError::ProficiencyOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl std::fmt::Display for Proficiency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a character comes from; grants two bonus skills at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    VaultDweller,
    Wastelander,
    RiftTouched,
}

impl Origin {
    /// The two skills this origin starts with a bonus in.
    pub fn bonus_skills(&self) -> [SkillId; 2] {
        match self {
            Origin::VaultDweller => [SkillId::from("mechanics"), SkillId::from("electronics")],
            Origin::Wastelander => [SkillId::from("scavenging"), SkillId::from("tracking")],
            Origin::RiftTouched => {
                [SkillId::from("rift_manipulation"), SkillId::from("perception")]
            }
        }
    }
}

/// Core attribute block.
///
/// Range rules live with content definitions, not here; the engine treats
/// attributes as opaque numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    pub strength: u8,
    pub agility: u8,
    pub endurance: u8,
    pub intellect: u8,
    pub charisma: u8,
    pub luck: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
    Nonbinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyType {
    Slight,
    Average,
    Broad,
}

/// Cosmetic character configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appearance {
    pub gender: Gender,
    pub body_type: BodyType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_and_validated() {
        let name = CharacterName::new("  Vex  ").unwrap();
        assert_eq!(name.as_str(), "Vex");

        assert_eq!(CharacterName::new("   "), Err(ValueError::EmptyName));
        assert_eq!(
            CharacterName::new("x".repeat(61)),
            Err(ValueError::NameTooLong { max: 60 })
        );
    }

    #[test]
    fn proficiency_is_bounded() {
        assert_eq!(Proficiency::new(100).unwrap().value(), 100);
        assert_eq!(
            Proficiency::new(101),
            Err(ValueError::ProficiencyOutOfRange(101))
        );
    }

    #[test]
    fn each_origin_grants_two_bonus_skills() {
        for origin in [Origin::VaultDweller, Origin::Wastelander, Origin::RiftTouched] {
            let [a, b] = origin.bonus_skills();
            assert_ne!(a, b);
        }
        assert_eq!(
            Origin::RiftTouched.bonus_skills()[0],
            SkillId::from("rift_manipulation")
        );
    }
}
