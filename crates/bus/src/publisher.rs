use std::time::Duration;

use async_trait::async_trait;

use event_store::{DomainEvent, event::META_INSTANCE_ID};

use crate::{BusError, Envelope, MessageBus, PublishError, TopicMap};

/// Publisher tuning knobs.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Total send attempts per event, including the first (default 3).
    pub max_attempts: u32,

    /// Base delay between attempts; attempt N waits N times this.
    pub retry_backoff: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// Asynchronous, retrying fan-out of domain events onto the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes a batch, resolving once every event has either been sent
    /// or exhausted its retry budget.
    ///
    /// Guarantees: at-least-once, ordered only within a partition key, not
    /// atomic with the event store append. Callers that already persisted
    /// the events treat failure here as best-effort.
    async fn publish(&self, events: &[DomainEvent]) -> Result<(), PublishError>;
}

/// [`EventPublisher`] backed by a [`MessageBus`].
///
/// Topic comes from the [`TopicMap`]; the partition key is the event's
/// instance id metadata, falling back to the aggregate id (with a warning,
/// since that weakens cross-aggregate ordering within an instance).
#[derive(Clone)]
pub struct BusPublisher<B: MessageBus> {
    bus: B,
    topics: TopicMap,
    config: PublisherConfig,
}

impl<B: MessageBus> BusPublisher<B> {
    /// Creates a publisher with default configuration.
    pub fn new(bus: B, topics: TopicMap) -> Self {
        Self::with_config(bus, topics, PublisherConfig::default())
    }

    /// Creates a publisher with explicit configuration.
    pub fn with_config(bus: B, topics: TopicMap, config: PublisherConfig) -> Self {
        Self { bus, topics, config }
    }

    fn partition_key(event: &DomainEvent) -> String {
        match event.metadata.get(META_INSTANCE_ID) {
            Some(instance_id) => instance_id.clone(),
            None => {
                tracing::warn!(
                    event_id = %event.event_id,
                    event_type = %event.event_type,
                    aggregate_id = %event.aggregate_id,
                    "event has no instance_id metadata; falling back to aggregate_id \
                     as partition key, which weakens cross-aggregate ordering"
                );
                event.aggregate_id.to_string()
            }
        }
    }

    /// Sends one envelope, retrying up to the attempt budget.
    ///
    /// Backoff waits are awaited, never slept on a blocked thread.
    async fn send_with_retry(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
        event: &DomainEvent,
    ) -> Result<(), PublishError> {
        let mut attempt = 1u32;
        loop {
            match self.bus.send(topic, key, payload.to_string()).await {
                Ok(()) => {
                    metrics::counter!("events_published_total").increment(1);
                    tracing::debug!(
                        event_id = %event.event_id,
                        topic,
                        key,
                        attempt,
                        "published event"
                    );
                    return Ok(());
                }
                Err(BusError::SendFailed { reason, .. }) => {
                    if attempt >= self.config.max_attempts {
                        metrics::counter!("publish_failures_total").increment(1);
                        return Err(PublishError::RetriesExhausted {
                            event_id: event.event_id,
                            topic: topic.to_string(),
                            attempts: attempt,
                        });
                    }
                    metrics::counter!("publish_retries_total").increment(1);
                    tracing::warn!(
                        event_id = %event.event_id,
                        topic,
                        attempt,
                        %reason,
                        "publish attempt failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<B: MessageBus> EventPublisher for BusPublisher<B> {
    async fn publish(&self, events: &[DomainEvent]) -> Result<(), PublishError> {
        let mut first_failure = None;

        for event in events {
            let topic = self.topics.topic_for(&event.aggregate_type).to_string();
            let key = Self::partition_key(event);
            let payload = serde_json::to_string(&Envelope::from(event))?;

            // Keep going after a failure so later events for other
            // partitions still go out; report the first failure once the
            // whole batch has been attempted.
            if let Err(e) = self.send_with_retry(&topic, &key, &payload, event).await {
                tracing::error!(
                    event_id = %event.event_id,
                    topic,
                    "publish failed after retries: {e}"
                );
                first_failure.get_or_insert(e);
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::InMemoryMessageBus;
    use crate::bus::TopicSubscription;
    use common::AggregateId;
    use event_store::SequenceNumber;

    fn test_event(aggregate_type: &str, instance_id: Option<&str>) -> DomainEvent {
        let mut builder = DomainEvent::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type(aggregate_type)
            .event_type("Test")
            .sequence_number(SequenceNumber::first())
            .payload_raw(serde_json::json!({}));
        if let Some(instance_id) = instance_id {
            builder = builder.metadata(META_INSTANCE_ID, instance_id);
        }
        builder.build()
    }

    fn fast_config() -> PublisherConfig {
        PublisherConfig {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(1),
        }
    }

    /// Bus double that fails the first N sends, then delegates.
    #[derive(Clone)]
    struct FlakyBus {
        inner: InMemoryMessageBus,
        failures_left: Arc<AtomicU32>,
        sends: Arc<AtomicU32>,
    }

    impl FlakyBus {
        fn failing(n: u32) -> Self {
            Self {
                inner: InMemoryMessageBus::new(),
                failures_left: Arc::new(AtomicU32::new(n)),
                sends: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl MessageBus for FlakyBus {
        async fn send(&self, topic: &str, key: &str, payload: String) -> Result<(), BusError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BusError::SendFailed {
                    topic: topic.to_string(),
                    reason: "injected failure".to_string(),
                });
            }
            self.inner.send(topic, key, payload).await
        }

        async fn subscribe(&self, topic: &str) -> TopicSubscription {
            self.inner.subscribe(topic).await
        }
    }

    #[tokio::test]
    async fn publishes_to_topic_mapped_from_aggregate_type() {
        let bus = InMemoryMessageBus::new();
        let publisher = BusPublisher::new(bus.clone(), TopicMap::new());
        let sub = bus.subscribe(TopicMap::PARTY).await;

        publisher
            .publish(&[test_event("Party", Some("i-1"))])
            .await
            .unwrap();

        let delivery = sub.recv().await;
        assert_eq!(delivery.key, "i-1");
        let envelope: Envelope = serde_json::from_str(&delivery.payload).unwrap();
        assert_eq!(envelope.aggregate_type, "Party");
    }

    #[tokio::test]
    async fn unmapped_aggregate_goes_to_fallback_topic() {
        let bus = InMemoryMessageBus::new();
        let publisher = BusPublisher::new(bus.clone(), TopicMap::new());

        publisher
            .publish(&[test_event("ContentVersion", Some("i-1"))])
            .await
            .unwrap();

        assert_eq!(bus.pending(TopicMap::GENERAL).await, 1);
    }

    #[tokio::test]
    async fn partition_key_falls_back_to_aggregate_id() {
        let bus = InMemoryMessageBus::new();
        let publisher = BusPublisher::new(bus.clone(), TopicMap::new());
        let sub = bus.subscribe(TopicMap::PARTY).await;

        let event = test_event("Party", None);
        let aggregate_id = event.aggregate_id.to_string();
        publisher.publish(&[event]).await.unwrap();

        assert_eq!(sub.recv().await.key, aggregate_id);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_until_success() {
        let bus = FlakyBus::failing(2);
        let publisher = BusPublisher::with_config(bus.clone(), TopicMap::new(), fast_config());

        publisher
            .publish(&[test_event("Party", Some("i-1"))])
            .await
            .unwrap();

        assert_eq!(bus.sends.load(Ordering::SeqCst), 3);
        assert_eq!(bus.inner.pending(TopicMap::PARTY).await, 1);
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_fails_the_publish() {
        let bus = FlakyBus::failing(u32::MAX);
        let publisher = BusPublisher::with_config(bus.clone(), TopicMap::new(), fast_config());

        let result = publisher.publish(&[test_event("Party", Some("i-1"))]).await;

        assert!(matches!(
            result,
            Err(PublishError::RetriesExhausted { attempts: 3, .. })
        ));
        assert_eq!(bus.sends.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn later_events_still_sent_after_a_failure() {
        // First event exhausts its three attempts, second succeeds.
        let bus = FlakyBus::failing(3);
        let publisher = BusPublisher::with_config(bus.clone(), TopicMap::new(), fast_config());

        let result = publisher
            .publish(&[
                test_event("Party", Some("i-1")),
                test_event("Party", Some("i-1")),
            ])
            .await;

        assert!(matches!(result, Err(PublishError::RetriesExhausted { .. })));
        assert_eq!(bus.inner.pending(TopicMap::PARTY).await, 1);
    }

    #[tokio::test]
    async fn events_for_one_instance_stay_in_order() {
        let bus = InMemoryMessageBus::new();
        let publisher = BusPublisher::new(bus.clone(), TopicMap::new());
        let sub = bus.subscribe(TopicMap::PARTY).await;

        let aggregate_id = AggregateId::new();
        let events: Vec<DomainEvent> = (1..=5)
            .map(|seq| {
                DomainEvent::builder()
                    .aggregate_id(aggregate_id)
                    .aggregate_type("Party")
                    .event_type("Test")
                    .sequence_number(SequenceNumber::new(seq))
                    .payload_raw(serde_json::json!({}))
                    .metadata(META_INSTANCE_ID, "i-1")
                    .build()
            })
            .collect();

        publisher.publish(&events).await.unwrap();

        let mut last = SequenceNumber::initial();
        for _ in 0..5 {
            let delivery = sub.recv().await;
            assert_eq!(delivery.key, "i-1");
            let envelope: Envelope = serde_json::from_str(&delivery.payload).unwrap();
            assert!(envelope.sequence_number > last);
            last = envelope.sequence_number;
        }
    }
}
