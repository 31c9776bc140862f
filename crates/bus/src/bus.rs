use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::BusError;

/// One message as handed to a consumer.
///
/// `attempt` starts at 1 and increments on every redelivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub key: String,
    pub payload: String,
    pub attempt: u32,
}

/// Transport abstraction for the partitioned message bus.
///
/// Messages sharing a `key` are ordered relative to each other; consumers
/// must tolerate redelivery (at-least-once) and out-of-order arrival across
/// partitions.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Sends one message to a topic with a partition key.
    async fn send(&self, topic: &str, key: &str, payload: String) -> Result<(), BusError>;

    /// Opens a subscription to a topic.
    async fn subscribe(&self, topic: &str) -> TopicSubscription;
}

struct TopicQueue {
    messages: Mutex<VecDeque<Delivery>>,
    notify: Notify,
}

impl TopicQueue {
    fn new() -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }
}

/// In-process message bus backed by per-topic FIFO queues.
///
/// A single queue per topic gives total order per topic, which is a strict
/// superset of the per-partition-key ordering the contract requires.
/// Redelivery re-enqueues at the back with an incremented attempt count.
#[derive(Clone, Default)]
pub struct InMemoryMessageBus {
    topics: Arc<Mutex<HashMap<String, Arc<TopicQueue>>>>,
}

impl InMemoryMessageBus {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    async fn topic(&self, name: &str) -> Arc<TopicQueue> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(TopicQueue::new()))
            .clone()
    }

    /// Returns the number of messages waiting on a topic.
    pub async fn pending(&self, topic: &str) -> usize {
        self.topic(topic).await.messages.lock().await.len()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn send(&self, topic: &str, key: &str, payload: String) -> Result<(), BusError> {
        let queue = self.topic(topic).await;
        queue.messages.lock().await.push_back(Delivery {
            key: key.to_string(),
            payload,
            attempt: 1,
        });
        queue.notify.notify_waiters();
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> TopicSubscription {
        TopicSubscription {
            topic: topic.to_string(),
            queue: self.topic(topic).await,
        }
    }
}

/// A consumer's handle on one topic.
pub struct TopicSubscription {
    topic: String,
    queue: Arc<TopicQueue>,
}

impl TopicSubscription {
    /// Returns the topic name this subscription reads from.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for and takes the next message.
    pub async fn recv(&self) -> Delivery {
        loop {
            // Register for the wakeup before checking the queue, so a send
            // landing in between is not missed.
            let notified = self.queue.notify.notified();
            if let Some(delivery) = self.queue.messages.lock().await.pop_front() {
                return delivery;
            }
            notified.await;
        }
    }

    /// Takes the next message if one is waiting.
    pub async fn try_recv(&self) -> Option<Delivery> {
        self.queue.messages.lock().await.pop_front()
    }

    /// Puts a message back at the end of the queue for another attempt.
    pub async fn redeliver(&self, mut delivery: Delivery) {
        delivery.attempt += 1;
        let mut messages = self.queue.messages.lock().await;
        messages.push_back(delivery);
        self.queue.notify.notify_waiters();
    }
}
