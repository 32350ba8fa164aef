//! Redis pub/sub bus, for deployments with several server processes.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use super::{BroadcastBus, BusError, Subscription};
use crate::config::RedisSettings;
use crate::domain::Topic;

/// Bus backed by Redis PUBLISH/SUBSCRIBE.
///
/// Publishing shares one auto-reconnecting connection. Every subscription
/// holds its own pub/sub connection, closed when the stream is dropped.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    publisher: ConnectionManager,
}

impl RedisBus {
    /// Connect to Redis.
    #[instrument(skip(settings), fields(url = %settings.url))]
    pub async fn connect(settings: &RedisSettings) -> Result<Self, BusError> {
        info!("Connecting to Redis...");
        let client = Client::open(settings.url.as_str())?;
        let publisher = ConnectionManager::new(client.clone()).await?;
        info!("Redis connection established");
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl BroadcastBus for RedisBus {
    async fn publish(&self, topic: &Topic, payload: String) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        let receivers = redis::cmd("PUBLISH")
            .arg(topic.as_str())
            .arg(payload)
            .query_async::<i64>(&mut conn)
            .await?;
        tracing::trace!(topic = %topic, receivers, "Envelope published");
        Ok(())
    }

    async fn subscribe(&self, topic: &Topic) -> Result<Subscription, BusError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(topic.as_str()).await?;

        let topic = topic.clone();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let decoded = msg.get_payload::<String>();
            let topic = topic.clone();
            async move {
                match decoded {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        tracing::warn!(topic = %topic, error = %e, "Dropping undecodable envelope");
                        None
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    async fn ping(&self) -> Result<(), BusError> {
        let mut conn = self.publisher.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
