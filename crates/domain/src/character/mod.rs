//! The character aggregate: identity, sheet, and skill progression.

mod aggregate;
mod events;
mod values;

pub use aggregate::{Character, CharacterError};
pub use events::{CharacterCreated, CharacterEvent, CharacterRenamed, SkillTrained};
pub use values::{
    Appearance, Attributes, BodyType, CharacterName, Gender, Origin, Proficiency, SkillId,
    ValueError,
};
