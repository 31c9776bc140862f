//! Command handlers wiring aggregates to their repositories.
//!
//! Handlers are constructed explicitly at startup with the stores and
//! publisher they need; there is no registry or discovery. Each command
//! loads fresh state, runs the aggregate's command method, and saves the
//! resulting events, retrying a bounded number of times when another
//! writer wins the optimistic lock.

use std::sync::Arc;

use thiserror::Error;

use bus::EventPublisher;
use common::{AgentId, CharacterId, InstanceId, PartyId};
use domain::character::{
    Appearance, Attributes, CharacterName, Origin, Proficiency, SkillId, ValueError,
};
use domain::{
    Character, CharacterError, DomainError, EventContext, EventSourcedRepository, Instance, Party,
    PartyError,
};
use event_store::{EventStore, SnapshotStore};

use crate::save_game::SaveGameLog;

/// Reloads-and-retries allowed per command when saves conflict.
const CONFLICT_RETRIES: u32 = 3;

/// Failures surfaced by command handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Party(#[from] PartyError),

    #[error(transparent)]
    Character(#[from] CharacterError),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("command abandoned after {0} concurrency conflicts")]
    TooManyConflicts(u32),
}

/// Everything needed to create a character.
#[derive(Debug, Clone)]
pub struct CharacterSetup {
    pub name: String,
    pub origin: Origin,
    pub attributes: Attributes,
    pub appearance: Appearance,
    pub focus_skills: Vec<SkillId>,
}

/// Identifiers of a freshly started game.
#[derive(Debug, Clone, Copy)]
pub struct NewGame {
    pub instance_id: InstanceId,
    pub party_id: PartyId,
    pub protagonist_id: CharacterId,
}

/// The write-side entry point for game commands.
pub struct GameService {
    instances: EventSourcedRepository<Instance>,
    parties: EventSourcedRepository<Party>,
    characters: EventSourcedRepository<Character>,
    save_games: Arc<SaveGameLog>,
}

impl GameService {
    pub fn new(
        store: Arc<dyn EventStore>,
        snapshots: Arc<dyn SnapshotStore>,
        publisher: Arc<dyn EventPublisher>,
        snapshot_threshold: i64,
    ) -> Self {
        let save_games = Arc::new(SaveGameLog::new(store.clone()));
        Self {
            instances: EventSourcedRepository::new(
                store.clone(),
                snapshots.clone(),
                publisher.clone(),
            )
            .with_snapshot_threshold(snapshot_threshold),
            parties: EventSourcedRepository::new(
                store.clone(),
                snapshots.clone(),
                publisher.clone(),
            )
            .with_snapshot_threshold(snapshot_threshold),
            characters: EventSourcedRepository::new(store, snapshots, publisher)
                .with_snapshot_threshold(snapshot_threshold),
            save_games,
        }
    }

    /// The save-game log this service records into.
    pub fn save_games(&self) -> &Arc<SaveGameLog> {
        &self.save_games
    }

    /// Starts a new playthrough: an instance, its protagonist, and a
    /// party seated around them, followed by an initial save point.
    #[tracing::instrument(skip(self, protagonist))]
    pub async fn start_new_game(
        &self,
        agent_id: AgentId,
        protagonist: CharacterSetup,
    ) -> Result<NewGame, HandlerError> {
        let instance_id = InstanceId::new();
        let ctx = EventContext::new(instance_id, agent_id);

        let mut instance = Instance::default();
        self.instances
            .save(&mut instance, Instance::create(instance_id, agent_id), &ctx)
            .await?;

        let protagonist_id = self.create_character(instance_id, &ctx, protagonist).await?;

        let party_id = PartyId::new();
        let mut party = Party::default();
        self.parties
            .save(
                &mut party,
                Party::create(party_id, instance_id, protagonist_id),
                &ctx,
            )
            .await?;

        self.save_games.record(instance_id).await;

        tracing::info!(%instance_id, %party_id, %protagonist_id, "started new game");
        Ok(NewGame {
            instance_id,
            party_id,
            protagonist_id,
        })
    }

    /// Creates a companion character and seats them in the party.
    #[tracing::instrument(skip(self, companion))]
    pub async fn recruit_companion(
        &self,
        instance_id: InstanceId,
        party_id: PartyId,
        agent_id: AgentId,
        companion: CharacterSetup,
    ) -> Result<CharacterId, HandlerError> {
        let ctx = EventContext::new(instance_id, agent_id);
        let character_id = self.create_character(instance_id, &ctx, companion).await?;

        let mut conflicts = 0;
        loop {
            let mut party = self.parties.load(party_id.as_aggregate_id()).await?;
            let events = party.add_member(character_id)?;
            match self.parties.save(&mut party, events, &ctx).await {
                Ok(()) => return Ok(character_id),
                Err(e) if e.is_conflict() => retry_or_bail(&mut conflicts)?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Raises a character's skill to a new rating.
    #[tracing::instrument(skip(self))]
    pub async fn train_skill(
        &self,
        instance_id: InstanceId,
        character_id: CharacterId,
        agent_id: AgentId,
        skill: SkillId,
        proficiency: Proficiency,
    ) -> Result<(), HandlerError> {
        let ctx = EventContext::new(instance_id, agent_id);
        let mut conflicts = 0;
        loop {
            let mut character = self
                .characters
                .load(character_id.as_aggregate_id())
                .await?;
            let events = character.train_skill(skill.clone(), proficiency)?;
            match self.characters.save(&mut character, events, &ctx).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_conflict() => retry_or_bail(&mut conflicts)?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Renames a character.
    pub async fn rename_character(
        &self,
        instance_id: InstanceId,
        character_id: CharacterId,
        agent_id: AgentId,
        name: &str,
    ) -> Result<(), HandlerError> {
        let name = CharacterName::new(name)?;
        let ctx = EventContext::new(instance_id, agent_id);
        let mut conflicts = 0;
        loop {
            let mut character = self
                .characters
                .load(character_id.as_aggregate_id())
                .await?;
            let events = character.rename(name.clone())?;
            match self.characters.save(&mut character, events, &ctx).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_conflict() => retry_or_bail(&mut conflicts)?,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Loads a character's current state by replay.
    pub async fn character(&self, character_id: CharacterId) -> Result<Character, HandlerError> {
        Ok(self
            .characters
            .load(character_id.as_aggregate_id())
            .await?)
    }

    /// Loads a party's current state by replay.
    pub async fn party(&self, party_id: PartyId) -> Result<Party, HandlerError> {
        Ok(self.parties.load(party_id.as_aggregate_id()).await?)
    }

    async fn create_character(
        &self,
        instance_id: InstanceId,
        ctx: &EventContext,
        setup: CharacterSetup,
    ) -> Result<CharacterId, HandlerError> {
        let character_id = CharacterId::new();
        let name = CharacterName::new(setup.name)?;
        let events = Character::create(
            character_id,
            instance_id,
            name,
            setup.origin,
            setup.attributes,
            setup.appearance,
            setup.focus_skills,
        );
        let mut character = Character::default();
        self.characters.save(&mut character, events, ctx).await?;
        Ok(character_id)
    }

}

/// Bumps the conflict counter, failing once [`CONFLICT_RETRIES`] is hit.
fn retry_or_bail(conflicts: &mut u32) -> Result<(), HandlerError> {
    *conflicts += 1;
    if *conflicts >= CONFLICT_RETRIES {
        return Err(HandlerError::TooManyConflicts(*conflicts));
    }
    tracing::debug!(conflicts = *conflicts, "save conflicted, reloading and retrying");
    Ok(())
}
