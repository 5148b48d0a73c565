//! Redis-backed message bus for distributed deployments.
//!
//! Topics map onto Redis pub/sub channels as `{prefix}:{topic}`. Payloads are
//! published verbatim so door controllers can read them without decoding an
//! envelope.

use crate::bus::{topic_matches, BusError, BusResult, BusStats, MessageBus, Subscription};
use crate::message::BusMessage;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Msg};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Listener tasks keyed by subscription id.
type Listeners = Arc<RwLock<HashMap<String, JoinHandle<()>>>>;

/// Redis-backed message bus.
///
/// Every subscription runs its own pattern listener. When the Redis
/// connection drops the listener ends, removes itself from the listener
/// table and the subscription reports [`BusError::ChannelClosed`];
/// reconnecting is left to the caller.
///
/// # Example
///
/// ```rust,no_run
/// use gatekeeper_bus::{MessageBus, RedisMessageBus};
///
/// async fn example() -> Result<(), Box<dyn std::error::Error>> {
///     let bus = RedisMessageBus::new("redis://localhost:6379", "gatekeeper").await?;
///     let mut cards = bus.subscribe("card_input").await?;
///     let message = cards.recv().await?;
///     println!("{}", message.payload);
///     Ok(())
/// }
/// ```
pub struct RedisMessageBus {
    /// Redis client
    client: Client,

    /// Shared connection for publishing
    conn: MultiplexedConnection,

    /// Channel prefix for all topics
    prefix: String,

    /// Listener tasks keyed by subscription id
    listeners: Listeners,

    /// Local channel capacity per subscription
    channel_capacity: usize,

    messages_published: AtomicU64,
    messages_delivered: Arc<AtomicU64>,
}

impl std::fmt::Debug for RedisMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMessageBus")
            .field("prefix", &self.prefix)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl RedisMessageBus {
    /// Connect to Redis.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., `redis://localhost:6379`)
    /// * `prefix` - Channel prefix (e.g., `gatekeeper`)
    ///
    /// # Returns
    ///
    /// A connected `RedisMessageBus` or a connection error
    pub async fn new(redis_url: &str, prefix: &str) -> BusResult<Self> {
        let client =
            Client::open(redis_url).map_err(|e| BusError::ConnectionError(e.to_string()))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;

        tracing::info!(prefix = %prefix, "Connected to Redis message bus");

        Ok(Self {
            client,
            conn,
            prefix: prefix.to_string(),
            listeners: Arc::new(RwLock::new(HashMap::new())),
            channel_capacity: 1024,
            messages_published: AtomicU64::new(0),
            messages_delivered: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Redis channel for a topic.
    fn channel_key(&self, topic: &str) -> String {
        channel_key(&self.prefix, topic)
    }

    /// Redis glob for a topic pattern. Matches a superset of the pattern;
    /// the listener filters precisely with [`topic_matches`].
    fn channel_pattern(&self, pattern: &str) -> String {
        self.channel_key(pattern).replace(['+', '#'], "*")
    }
}

fn channel_key(prefix: &str, topic: &str) -> String {
    format!("{}:{}", prefix, topic)
}

/// Listener loop that forwards matching Redis messages to one subscription.
///
/// Removes its own entry from `listeners` when the stream ends or the
/// subscription is dropped.
async fn redis_listener_loop<S>(
    stream: S,
    prefix: String,
    pattern: String,
    tx: broadcast::Sender<BusMessage>,
    delivered: Arc<AtomicU64>,
    listeners: Listeners,
    id: String,
) where
    S: Stream<Item = Msg> + Send,
{
    forward_messages(stream, &prefix, &pattern, &tx, &delivered).await;
    listeners.write().await.remove(&id);
}

async fn forward_messages<S>(
    stream: S,
    prefix: &str,
    pattern: &str,
    tx: &broadcast::Sender<BusMessage>,
    delivered: &AtomicU64,
) where
    S: Stream<Item = Msg> + Send,
{
    let channel_prefix = format!("{}:", prefix);
    futures::pin_mut!(stream);

    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name();
        let Some(topic) = channel.strip_prefix(&channel_prefix) else {
            continue;
        };
        if !topic_matches(pattern, topic) {
            continue;
        }

        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, topic = %topic, "Failed to read message payload");
                continue;
            }
        };

        if tx.send(BusMessage::new(topic, payload)).is_err() {
            tracing::debug!(pattern = %pattern, "Subscription dropped, stopping listener");
            return;
        }
        delivered.fetch_add(1, Ordering::Relaxed);
    }

    tracing::warn!(pattern = %pattern, "Redis pub/sub connection lost");
}

#[async_trait]
impl MessageBus for RedisMessageBus {
    async fn publish(&self, message: BusMessage) -> BusResult<()> {
        let channel = self.channel_key(&message.topic);
        let mut conn = self.conn.clone();

        conn.publish::<_, _, ()>(&channel, &message.payload)
            .await
            .map_err(|e| BusError::PublishError(e.to_string()))?;

        self.messages_published.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(topic = %message.topic, message_id = %message.id, "Published message to Redis");

        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> BusResult<Subscription> {
        let mut pubsub = self
            .client
            .get_async_connection()
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))?
            .into_pubsub();

        let redis_pattern = self.channel_pattern(pattern);
        pubsub
            .psubscribe(&redis_pattern)
            .await
            .map_err(|e| BusError::SubscribeError(e.to_string()))?;

        let id = uuid::Uuid::now_v7().to_string();
        let (tx, receiver) = broadcast::channel(self.channel_capacity);

        // Insert under the lock so a listener that ends at once cannot
        // remove itself before it is registered.
        let mut listeners = self.listeners.write().await;
        let handle = tokio::spawn(redis_listener_loop(
            pubsub.into_on_message(),
            self.prefix.clone(),
            pattern.to_string(),
            tx,
            self.messages_delivered.clone(),
            self.listeners.clone(),
            id.clone(),
        ));
        listeners.insert(id.clone(), handle);
        drop(listeners);

        tracing::info!(pattern = %pattern, redis_pattern = %redis_pattern, "Redis subscription started");

        Ok(Subscription {
            id,
            pattern: pattern.to_string(),
            receiver,
        })
    }

    async fn unsubscribe(&self, subscription_id: &str) -> BusResult<()> {
        if let Some(handle) = self.listeners.write().await.remove(subscription_id) {
            handle.abort();
        }
        Ok(())
    }

    async fn stats(&self) -> BusStats {
        BusStats {
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            active_subscriptions: self.listeners.read().await.len(),
        }
    }
}

impl Drop for RedisMessageBus {
    fn drop(&mut self) {
        if let Ok(mut listeners) = self.listeners.try_write() {
            for (_, handle) in listeners.drain() {
                handle.abort();
            }
        }
    }
}
