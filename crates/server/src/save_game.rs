//! Save-game bookkeeping.
//!
//! A save game is a pointer into the event log: the id of the most recent
//! event recorded for the instance at the moment of saving. Restoring a
//! save later means replaying the instance's streams; the pointer tells
//! tooling and support exactly where the log stood.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use common::InstanceId;
use event_store::{EventId, EventStore};

/// One recorded save point for an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveGame {
    pub instance_id: InstanceId,
    /// Most recent event for the instance when the save was taken.
    /// `None` when the instance had no events yet or the lookup failed.
    pub latest_event_id: Option<EventId>,
    pub saved_at: DateTime<Utc>,
}

/// Tracks the latest save point per instance.
pub struct SaveGameLog {
    store: Arc<dyn EventStore>,
    saves: RwLock<HashMap<InstanceId, SaveGame>>,
}

impl SaveGameLog {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            saves: RwLock::new(HashMap::new()),
        }
    }

    /// Records a save point for the instance.
    ///
    /// Failing to resolve the latest event id does not fail the save;
    /// the pointer is simply absent.
    pub async fn record(&self, instance_id: InstanceId) -> SaveGame {
        let latest_event_id = match self.store.latest_event_id(instance_id).await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!(
                    %instance_id,
                    "could not resolve latest event id for save: {e}"
                );
                None
            }
        };

        let save = SaveGame {
            instance_id,
            latest_event_id,
            saved_at: Utc::now(),
        };
        self.saves.write().await.insert(instance_id, save.clone());
        tracing::info!(%instance_id, "recorded save point");
        save
    }

    /// Returns the most recent save point for an instance, if any.
    pub async fn latest(&self, instance_id: InstanceId) -> Option<SaveGame> {
        self.saves.read().await.get(&instance_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use event_store::{DomainEvent, InMemoryEventStore, SequenceNumber};
    use event_store::event::META_INSTANCE_ID;

    use super::*;

    #[tokio::test]
    async fn save_points_track_the_latest_event() {
        let store = Arc::new(InMemoryEventStore::new());
        let log = SaveGameLog::new(store.clone());
        let instance_id = InstanceId::new();

        // No events yet.
        let empty = log.record(instance_id).await;
        assert!(empty.latest_event_id.is_none());

        let event = DomainEvent::builder()
            .aggregate_id(instance_id.as_aggregate_id())
            .aggregate_type("Instance")
            .event_type("InstanceCreated")
            .sequence_number(SequenceNumber::first())
            .payload_raw(serde_json::json!({}))
            .metadata(META_INSTANCE_ID, instance_id.to_string())
            .build();
        let event_id = event.event_id;
        store.append(vec![event]).await.unwrap();

        let save = log.record(instance_id).await;
        assert_eq!(save.latest_event_id, Some(event_id));
        assert_eq!(log.latest(instance_id).await, Some(save));
    }

    #[tokio::test]
    async fn latest_is_none_for_unsaved_instances() {
        let store = Arc::new(InMemoryEventStore::new());
        let log = SaveGameLog::new(store);
        assert!(log.latest(InstanceId::new()).await.is_none());
    }
}
