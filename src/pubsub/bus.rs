//! In-process topic bus.
//!
//! Each topic owns a tokio broadcast channel created on first subscription.
//! Publishing never blocks: a subscriber that falls more than `capacity`
//! events behind skips the missed ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;

/// Default per-topic buffer size.
pub const DEFAULT_TOPIC_CAPACITY: usize = 256;

struct Topics<T> {
    senders: HashMap<String, broadcast::Sender<T>>,
}

/// Topic-addressed publish/subscribe.
pub struct EventBus<T> {
    topics: Arc<Mutex<Topics<T>>>,
    capacity: usize,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            topics: Arc::clone(&self.topics),
            capacity: self.capacity,
        }
    }
}

impl<T: Clone + Send + 'static> EventBus<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(Mutex::new(Topics {
                senders: HashMap::new(),
            })),
            capacity: capacity.max(1),
        }
    }

    fn topics(&self) -> MutexGuard<'_, Topics<T>> {
        self.topics
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Publish `event` on `topic`. Returns how many subscribers it reached.
    pub fn publish(&self, topic: &str, event: T) -> usize {
        let sender = self.topics().senders.get(topic).cloned();
        // No subscribers is not an error.
        sender.map_or(0, |sender| sender.send(event).unwrap_or(0))
    }

    /// Subscribe to `topic`. The subscription ends when the returned value is dropped.
    pub fn subscribe(&self, topic: &str) -> Subscription<T> {
        let receiver = {
            let mut topics = self.topics();
            topics
                .senders
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };
        tracing::debug!(topic, "Subscribed to topic");

        Subscription {
            topic: topic.to_string(),
            receiver: Some(receiver),
            bus: self.clone(),
        }
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics().senders.len()
    }

    /// Number of subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics()
            .senders
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    fn prune(&self, topic: &str) {
        let mut topics = self.topics();
        if topics
            .senders
            .get(topic)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            topics.senders.remove(topic);
            tracing::debug!(topic, "Removed topic without subscribers");
        }
    }
}

/// A live subscription to one topic.
pub struct Subscription<T: Clone + Send + 'static> {
    topic: String,
    receiver: Option<broadcast::Receiver<T>>,
    bus: EventBus<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next event. Returns `None` once the topic is closed.
    pub async fn recv(&mut self) -> Option<T> {
        let receiver = self.receiver.as_mut()?;
        loop {
            match receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "Subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl<T: Clone + Send + 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        // The receiver must be gone before the topic's receiver count is checked.
        self.receiver.take();
        self.bus.prune(&self.topic);
    }
}
