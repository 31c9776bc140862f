use std::sync::Arc;
use std::time::Duration;

use bus::{Delivery, Envelope, TopicSubscription};

use crate::projection::Projection;

/// Attempt count at which redelivery churn is logged loudly.
const NOISY_ATTEMPTS: u32 = 10;

/// Base pause before a message is requeued, scaled by its attempt count.
const REDELIVER_DELAY: Duration = Duration::from_millis(50);

/// Drains one topic subscription into a set of projections.
///
/// Delivery semantics: a retryable failure from any projection requeues
/// the message at the back of the topic after a per-attempt backoff, so a
/// dependency that never arrives degrades to a slow poll instead of a busy
/// loop. Projections are idempotent, so the ones that already applied the
/// message simply converge on the retry. Fatal failures and undecodable
/// payloads are logged and dropped; redelivering them would fail
/// identically forever.
pub struct ProjectionConsumer {
    subscription: TopicSubscription,
    projections: Vec<Arc<dyn Projection>>,
}

impl ProjectionConsumer {
    pub fn new(subscription: TopicSubscription, projections: Vec<Arc<dyn Projection>>) -> Self {
        Self {
            subscription,
            projections,
        }
    }

    /// Receives and processes messages until the task is cancelled.
    pub async fn run(self) {
        tracing::info!(topic = self.subscription.topic(), "projection consumer started");
        loop {
            self.tick().await;
        }
    }

    /// Processes exactly one message, waiting for one if none is queued.
    pub async fn tick(&self) {
        let delivery = self.subscription.recv().await;
        self.process(delivery).await;
    }

    async fn process(&self, delivery: Delivery) {
        let envelope: Envelope = match serde_json::from_str(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                metrics::counter!("projection_events_dropped_total").increment(1);
                tracing::error!(
                    topic = self.subscription.topic(),
                    "dropping undecodable message: {e}"
                );
                return;
            }
        };

        let mut retry = false;
        for projection in &self.projections {
            match projection.handle(&envelope).await {
                Ok(()) => {}
                Err(e) if e.is_retryable() => {
                    retry = true;
                    if delivery.attempt >= NOISY_ATTEMPTS {
                        tracing::warn!(
                            projection = projection.name(),
                            event_id = %envelope.event_id,
                            event_type = %envelope.event_type,
                            attempt = delivery.attempt,
                            "event still waiting on a dependency: {e}"
                        );
                    } else {
                        tracing::debug!(
                            projection = projection.name(),
                            event_id = %envelope.event_id,
                            attempt = delivery.attempt,
                            "requeueing event: {e}"
                        );
                    }
                }
                Err(e) => {
                    metrics::counter!("projection_events_dropped_total").increment(1);
                    tracing::error!(
                        projection = projection.name(),
                        event_id = %envelope.event_id,
                        event_type = %envelope.event_type,
                        "dropping event after fatal projection error: {e}"
                    );
                }
            }
        }

        if retry {
            metrics::counter!("projection_retries_total").increment(1);
            tokio::time::sleep(REDELIVER_DELAY * delivery.attempt).await;
            self.subscription.redeliver(delivery).await;
        } else {
            metrics::counter!("projection_events_total").increment(1);
        }
    }
}
