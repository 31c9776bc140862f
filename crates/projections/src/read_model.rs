use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use bus::Envelope;
use common::{AgentId, CharacterId, InstanceId, PartyId};
use domain::character::{CharacterCreated, CharacterRenamed, Origin, Proficiency, SkillId, SkillTrained};
use domain::instance::InstanceCreated;
use domain::party::{PartyCreated, PartyMemberAdded, PartyMemberRemoved};

use crate::error::ProjectionError;
use crate::projection::Projection;

/// One playthrough, as the query side sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRow {
    pub instance_id: InstanceId,
    pub owner_agent_id: AgentId,
    pub created_at: DateTime<Utc>,
}

/// A party and its current membership.
#[derive(Debug, Clone, PartialEq)]
pub struct PartyRow {
    pub party_id: PartyId,
    pub instance_id: InstanceId,
    pub protagonist_id: CharacterId,
    pub members: BTreeSet<CharacterId>,
}

/// A character sheet as currently visible to queries.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRow {
    pub character_id: CharacterId,
    pub instance_id: InstanceId,
    pub name: String,
    pub origin: Origin,
    pub skills: BTreeMap<SkillId, Proficiency>,
}

/// In-memory read model over instances, parties, and characters.
///
/// All updates are upserts keyed by the row id, so redelivered events
/// converge instead of duplicating. Rows referencing another aggregate
/// that has not arrived yet fail with a retryable
/// [`ProjectionError::DependencyMissing`]; the consumer requeues the
/// message and the dependency usually lands before the retry.
#[derive(Default)]
pub struct GameReadModel {
    instances: Arc<RwLock<HashMap<InstanceId, InstanceRow>>>,
    parties: Arc<RwLock<HashMap<PartyId, PartyRow>>>,
    characters: Arc<RwLock<HashMap<CharacterId, CharacterRow>>>,
}

impl GameReadModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn instance(&self, instance_id: InstanceId) -> Option<InstanceRow> {
        self.instances.read().await.get(&instance_id).cloned()
    }

    pub async fn party(&self, party_id: PartyId) -> Option<PartyRow> {
        self.parties.read().await.get(&party_id).cloned()
    }

    pub async fn character(&self, character_id: CharacterId) -> Option<CharacterRow> {
        self.characters.read().await.get(&character_id).cloned()
    }

    /// All characters belonging to one instance, ordered by id.
    pub async fn characters_in_instance(&self, instance_id: InstanceId) -> Vec<CharacterRow> {
        let mut rows: Vec<CharacterRow> = self
            .characters
            .read()
            .await
            .values()
            .filter(|row| row.instance_id == instance_id)
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.character_id);
        rows
    }

    fn missing(detail: String) -> ProjectionError {
        ProjectionError::DependencyMissing {
            projection: "game_read_model",
            detail,
        }
    }

    async fn apply_instance_created(
        &self,
        envelope: &Envelope,
        event: InstanceCreated,
    ) -> Result<(), ProjectionError> {
        self.instances.write().await.insert(
            event.instance_id,
            InstanceRow {
                instance_id: event.instance_id,
                owner_agent_id: event.owner_agent_id,
                created_at: envelope.timestamp,
            },
        );
        Ok(())
    }

    async fn apply_party_created(&self, event: PartyCreated) -> Result<(), ProjectionError> {
        if self.instance(event.instance_id).await.is_none() {
            return Err(Self::missing(format!(
                "party {} references instance {} which has no row yet",
                event.party_id, event.instance_id
            )));
        }
        let mut members = BTreeSet::new();
        members.insert(event.protagonist_id);
        self.parties.write().await.insert(
            event.party_id,
            PartyRow {
                party_id: event.party_id,
                instance_id: event.instance_id,
                protagonist_id: event.protagonist_id,
                members,
            },
        );
        Ok(())
    }

    async fn apply_member_added(
        &self,
        party_id: PartyId,
        event: PartyMemberAdded,
    ) -> Result<(), ProjectionError> {
        let mut parties = self.parties.write().await;
        let Some(row) = parties.get_mut(&party_id) else {
            return Err(Self::missing(format!("party {party_id} has no row yet")));
        };
        row.members.insert(event.character_id);
        Ok(())
    }

    async fn apply_member_removed(
        &self,
        party_id: PartyId,
        event: PartyMemberRemoved,
    ) -> Result<(), ProjectionError> {
        let mut parties = self.parties.write().await;
        let Some(row) = parties.get_mut(&party_id) else {
            return Err(Self::missing(format!("party {party_id} has no row yet")));
        };
        row.members.remove(&event.character_id);
        Ok(())
    }

    async fn apply_character_created(
        &self,
        event: CharacterCreated,
    ) -> Result<(), ProjectionError> {
        if self.instance(event.instance_id).await.is_none() {
            return Err(Self::missing(format!(
                "character {} references instance {} which has no row yet",
                event.character_id, event.instance_id
            )));
        }
        self.characters.write().await.insert(
            event.character_id,
            CharacterRow {
                character_id: event.character_id,
                instance_id: event.instance_id,
                name: event.name.to_string(),
                origin: event.origin,
                skills: event.skills,
            },
        );
        Ok(())
    }

    async fn apply_skill_trained(
        &self,
        character_id: CharacterId,
        event: SkillTrained,
    ) -> Result<(), ProjectionError> {
        let mut characters = self.characters.write().await;
        let Some(row) = characters.get_mut(&character_id) else {
            return Err(Self::missing(format!(
                "character {character_id} has no row yet"
            )));
        };
        row.skills.insert(event.skill, event.proficiency);
        Ok(())
    }

    async fn apply_renamed(
        &self,
        character_id: CharacterId,
        event: CharacterRenamed,
    ) -> Result<(), ProjectionError> {
        let mut characters = self.characters.write().await;
        let Some(row) = characters.get_mut(&character_id) else {
            return Err(Self::missing(format!(
                "character {character_id} has no row yet"
            )));
        };
        row.name = event.name.to_string();
        Ok(())
    }
}

#[async_trait]
impl Projection for GameReadModel {
    fn name(&self) -> &'static str {
        "game_read_model"
    }

    async fn handle(&self, envelope: &Envelope) -> Result<(), ProjectionError> {
        match envelope.event_type.as_str() {
            "InstanceCreated" => {
                let event = serde_json::from_value(envelope.payload.clone())?;
                self.apply_instance_created(envelope, event).await
            }
            "PartyCreated" => {
                let event = serde_json::from_value(envelope.payload.clone())?;
                self.apply_party_created(event).await
            }
            "PartyMemberAdded" => {
                let party_id = PartyId::from_uuid(envelope.aggregate_id.as_uuid());
                let event = serde_json::from_value(envelope.payload.clone())?;
                self.apply_member_added(party_id, event).await
            }
            "PartyMemberRemoved" => {
                let party_id = PartyId::from_uuid(envelope.aggregate_id.as_uuid());
                let event = serde_json::from_value(envelope.payload.clone())?;
                self.apply_member_removed(party_id, event).await
            }
            "CharacterCreated" => {
                let event = serde_json::from_value(envelope.payload.clone())?;
                self.apply_character_created(event).await
            }
            "SkillTrained" => {
                let character_id = CharacterId::from_uuid(envelope.aggregate_id.as_uuid());
                let event = serde_json::from_value(envelope.payload.clone())?;
                self.apply_skill_trained(character_id, event).await
            }
            "CharacterRenamed" => {
                let character_id = CharacterId::from_uuid(envelope.aggregate_id.as_uuid());
                let event = serde_json::from_value(envelope.payload.clone())?;
                self.apply_renamed(character_id, event).await
            }
            // Events this read model does not track.
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::envelopes;

    #[tokio::test]
    async fn instance_then_party_builds_rows() {
        let model = GameReadModel::new();
        let instance_id = InstanceId::new();
        let party_id = PartyId::new();
        let protagonist = CharacterId::new();

        model
            .handle(&envelopes::instance_created(instance_id, AgentId::new()))
            .await
            .unwrap();
        model
            .handle(&envelopes::party_created(party_id, instance_id, protagonist))
            .await
            .unwrap();

        let row = model.party(party_id).await.unwrap();
        assert_eq!(row.instance_id, instance_id);
        assert!(row.members.contains(&protagonist));
    }

    #[tokio::test]
    async fn party_before_instance_is_a_retryable_miss() {
        let model = GameReadModel::new();

        let err = model
            .handle(&envelopes::party_created(
                PartyId::new(),
                InstanceId::new(),
                CharacterId::new(),
            ))
            .await
            .unwrap_err();

        assert!(err.is_retryable());
        assert!(model.party(PartyId::new()).await.is_none());
    }

    #[tokio::test]
    async fn redelivered_events_converge() {
        let model = GameReadModel::new();
        let instance_id = InstanceId::new();
        let party_id = PartyId::new();
        let protagonist = CharacterId::new();
        let companion = CharacterId::new();

        model
            .handle(&envelopes::instance_created(instance_id, AgentId::new()))
            .await
            .unwrap();
        model
            .handle(&envelopes::party_created(party_id, instance_id, protagonist))
            .await
            .unwrap();

        let added = envelopes::member_added(party_id, companion);
        model.handle(&added).await.unwrap();
        model.handle(&added).await.unwrap();

        assert_eq!(model.party(party_id).await.unwrap().members.len(), 2);
    }

    #[tokio::test]
    async fn character_sheet_tracks_training_and_renames() {
        let model = GameReadModel::new();
        let instance_id = InstanceId::new();
        let character_id = CharacterId::new();

        model
            .handle(&envelopes::instance_created(instance_id, AgentId::new()))
            .await
            .unwrap();
        model
            .handle(&envelopes::character_created(
                character_id,
                instance_id,
                "Vex",
                Origin::Wastelander,
            ))
            .await
            .unwrap();
        model
            .handle(&envelopes::skill_trained(character_id, "tracking", 40))
            .await
            .unwrap();
        model
            .handle(&envelopes::renamed(character_id, "Ash"))
            .await
            .unwrap();

        let row = model.character(character_id).await.unwrap();
        assert_eq!(row.name, "Ash");
        assert_eq!(
            row.skills.get(&SkillId::from("tracking")),
            Some(&Proficiency::new(40).unwrap())
        );
    }

    #[tokio::test]
    async fn unknown_event_types_are_ignored() {
        let model = GameReadModel::new();
        let envelope = envelopes::of_type("EncounterResolved", serde_json::json!({"foo": 1}));
        model.handle(&envelope).await.unwrap();
    }

    #[tokio::test]
    async fn characters_in_instance_filters_by_instance() {
        let model = GameReadModel::new();
        let a = InstanceId::new();
        let b = InstanceId::new();
        let character_id = CharacterId::new();

        for instance in [a, b] {
            model
                .handle(&envelopes::instance_created(instance, AgentId::new()))
                .await
                .unwrap();
        }
        model
            .handle(&envelopes::character_created(
                character_id,
                a,
                "Vex",
                Origin::VaultDweller,
            ))
            .await
            .unwrap();

        assert_eq!(model.characters_in_instance(a).await.len(), 1);
        assert!(model.characters_in_instance(b).await.is_empty());
    }
}
