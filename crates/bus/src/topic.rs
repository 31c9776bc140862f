use std::collections::BTreeMap;

/// Routes aggregate types onto a small, fixed set of topics.
///
/// Related consumers share a topic rather than subscribing to one topic per
/// aggregate type; anything unmapped lands on the fallback topic.
#[derive(Debug, Clone)]
pub struct TopicMap {
    routes: BTreeMap<String, String>,
    fallback: String,
}

impl TopicMap {
    /// Default routing: party-forming aggregates on one topic, world
    /// entities on another, encounters on a third, everything else on the
    /// general fallback.
    pub fn new() -> Self {
        let mut routes = BTreeMap::new();
        for aggregate_type in ["Character", "Party", "Instance"] {
            routes.insert(aggregate_type.to_string(), Self::PARTY.to_string());
        }
        for aggregate_type in ["WorldEntity", "Location"] {
            routes.insert(aggregate_type.to_string(), Self::WORLD.to_string());
        }
        for aggregate_type in ["Encounter", "Combat"] {
            routes.insert(aggregate_type.to_string(), Self::ENCOUNTER.to_string());
        }
        Self {
            routes,
            fallback: Self::GENERAL.to_string(),
        }
    }

    /// Topic for party/character/instance events.
    pub const PARTY: &'static str = "game.events.party";
    /// Topic for world entity events.
    pub const WORLD: &'static str = "game.events.world";
    /// Topic for encounter/combat events.
    pub const ENCOUNTER: &'static str = "game.events.encounter";
    /// Fallback topic for unmapped aggregate types.
    pub const GENERAL: &'static str = "game.events.general";

    /// Replaces the fallback topic, keeping the explicit routes.
    pub fn with_fallback(mut self, topic: impl Into<String>) -> Self {
        self.fallback = topic.into();
        self
    }

    /// Overrides or adds a single route.
    pub fn route(mut self, aggregate_type: impl Into<String>, topic: impl Into<String>) -> Self {
        self.routes.insert(aggregate_type.into(), topic.into());
        self
    }

    /// Resolves the topic for an aggregate type.
    pub fn topic_for(&self, aggregate_type: &str) -> &str {
        self.routes
            .get(aggregate_type)
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    /// Returns the fallback topic.
    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}

impl Default for TopicMap {
    fn default() -> Self {
        Self::new()
    }
}
