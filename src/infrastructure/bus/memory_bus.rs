//! In-process bus on top of tokio broadcast channels.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{BroadcastBus, BusError, Subscription};
use crate::domain::Topic;

/// Single-node bus: one broadcast channel per topic with live subscribers.
#[derive(Debug)]
pub struct MemoryBus {
    topics: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl MemoryBus {
    /// `capacity` bounds the envelopes buffered per topic; a subscriber that
    /// falls further behind skips the overflow.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscriptions on a topic.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics
            .get(topic.as_str())
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl BroadcastBus for MemoryBus {
    async fn publish(&self, topic: &Topic, payload: String) -> Result<(), BusError> {
        let delivered = match self.topics.get(topic.as_str()) {
            Some(tx) => tx.send(payload).is_ok(),
            None => false,
        };

        if !delivered {
            // Drop channels whose subscribers are all gone.
            self.topics
                .remove_if(topic.as_str(), |_, tx| tx.receiver_count() == 0);
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &Topic) -> Result<Subscription, BusError> {
        let rx = self
            .topics
            .entry(topic.as_str().to_owned())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        let topic = topic.clone();
        let stream = futures::stream::unfold(rx, move |mut rx| {
            let topic = topic.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(payload) => return Some((payload, rx)),
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(topic = %topic, skipped, "Subscriber lagged, envelopes dropped");
                        }
                        Err(RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), BusError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
