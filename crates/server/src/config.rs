//! Runtime configuration loaded from environment variables.

use domain::DEFAULT_SNAPSHOT_THRESHOLD;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: Postgres connection string; unset runs fully in memory
/// - `METRICS_PORT`: Prometheus scrape endpoint port (default: `9090`)
/// - `SNAPSHOT_THRESHOLD`: events between snapshots, `0` disables (default: `100`)
/// - `PUBLISH_MAX_ATTEMPTS`: send attempts per event (default: `3`)
/// - `TOPIC_PARTY` / `TOPIC_WORLD` / `TOPIC_ENCOUNTER` / `TOPIC_FALLBACK`:
///   topic name overrides
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub metrics_port: u16,
    pub snapshot_threshold: i64,
    pub publish_max_attempts: u32,
    pub topic_party: Option<String>,
    pub topic_world: Option<String>,
    pub topic_encounter: Option<String>,
    pub topic_fallback: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9090),
            snapshot_threshold: std::env::var("SNAPSHOT_THRESHOLD")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(DEFAULT_SNAPSHOT_THRESHOLD),
            publish_max_attempts: std::env::var("PUBLISH_MAX_ATTEMPTS")
                .ok()
                .and_then(|a| a.parse().ok())
                .unwrap_or(3),
            topic_party: std::env::var("TOPIC_PARTY").ok(),
            topic_world: std::env::var("TOPIC_WORLD").ok(),
            topic_encounter: std::env::var("TOPIC_ENCOUNTER").ok(),
            topic_fallback: std::env::var("TOPIC_FALLBACK").ok(),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Builds the topic routing table, applying any overrides.
    pub fn topic_map(&self) -> bus::TopicMap {
        let mut map = bus::TopicMap::new();
        if let Some(topic) = &self.topic_party {
            for aggregate_type in ["Character", "Party", "Instance"] {
                map = map.route(aggregate_type, topic.clone());
            }
        }
        if let Some(topic) = &self.topic_world {
            for aggregate_type in ["WorldEntity", "Location"] {
                map = map.route(aggregate_type, topic.clone());
            }
        }
        if let Some(topic) = &self.topic_encounter {
            for aggregate_type in ["Encounter", "Combat"] {
                map = map.route(aggregate_type, topic.clone());
            }
        }
        if let Some(topic) = &self.topic_fallback {
            map = map.with_fallback(topic.clone());
        }
        map
    }

    /// Topic the read-model consumer subscribes to.
    pub fn party_topic(&self) -> String {
        self.topic_party
            .clone()
            .unwrap_or_else(|| bus::TopicMap::PARTY.to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            metrics_port: 9090,
            snapshot_threshold: DEFAULT_SNAPSHOT_THRESHOLD,
            publish_max_attempts: 3,
            topic_party: None,
            topic_world: None,
            topic_encounter: None,
            topic_fallback: None,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = Config::default();
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.snapshot_threshold, 100);
        assert_eq!(config.publish_max_attempts, 3);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn default_topic_map_matches_bus_defaults() {
        let config = Config::default();
        let map = config.topic_map();
        assert_eq!(map.topic_for("Party"), bus::TopicMap::PARTY);
        assert_eq!(map.topic_for("Encounter"), bus::TopicMap::ENCOUNTER);
        assert_eq!(config.party_topic(), bus::TopicMap::PARTY);
    }

    #[test]
    fn topic_overrides_apply() {
        let config = Config {
            topic_party: Some("alt.party".to_string()),
            ..Config::default()
        };
        let map = config.topic_map();
        assert_eq!(map.topic_for("Party"), "alt.party");
        assert_eq!(map.topic_for("Instance"), "alt.party");
        assert_eq!(map.topic_for("WorldEntity"), bus::TopicMap::WORLD);
        assert_eq!(config.party_topic(), "alt.party");
    }

    #[test]
    fn fallback_override_leaves_other_routes_intact() {
        let config = Config {
            topic_party: Some("alt.party".to_string()),
            topic_fallback: Some("alt.general".to_string()),
            ..Config::default()
        };
        let map = config.topic_map();
        assert_eq!(map.topic_for("ContentVersion"), "alt.general");
        assert_eq!(map.topic_for("Party"), "alt.party");
        assert_eq!(map.topic_for("WorldEntity"), bus::TopicMap::WORLD);
    }
}
