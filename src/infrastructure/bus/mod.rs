//! Broadcast Bus
//!
//! Topic-addressed fan-out of serialized envelopes between sessions, possibly
//! across server processes. Delivery is at-most-once: envelopes published to a
//! topic nobody is subscribed to are dropped.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+      publish(topic)      +-------------------+
//! |  receive loop     | -----------------------> |  BroadcastBus     |
//! +-------------------+                          +-------------------+
//!                                                   |            |
//!                                                   v            v
//!                                              RedisBus      MemoryBus
//!                                              (PUBLISH /    (tokio broadcast
//!                                               SUBSCRIBE)    per topic)
//!                                                   |
//!                                                   v
//! +-------------------+   subscribe(topic) stream
//! |  send loop        | <--------------------------
//! +-------------------+
//! ```

mod memory_bus;
mod redis_bus;

pub use memory_bus::MemoryBus;
pub use redis_bus::RedisBus;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::Topic;

/// Errors raised by a bus backend.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Envelopes delivered on a subscription, in publish order per publisher.
///
/// Dropping the stream unsubscribes.
pub type Subscription = BoxStream<'static, String>;

/// Topic-based publish/subscribe transport.
#[async_trait]
pub trait BroadcastBus: Send + Sync {
    /// Deliver `payload` to every current subscriber of `topic`.
    async fn publish(&self, topic: &Topic, payload: String) -> Result<(), BusError>;

    /// Subscribe to `topic`. The subscription is active once this returns, so
    /// anything published afterwards is delivered.
    async fn subscribe(&self, topic: &Topic) -> Result<Subscription, BusError>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<(), BusError>;

    /// Backend name for health reports.
    fn backend(&self) -> &'static str;
}
