//! Message bus implementation
//!
//! This module provides the message bus abstraction and the in-memory
//! implementation used by single-process deployments and tests.

use crate::message::BusMessage;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;

/// Message bus error types.
#[derive(Debug, Error)]
pub enum BusError {
    /// Failed to publish message
    #[error("Failed to publish message: {0}")]
    PublishError(String),

    /// Failed to subscribe
    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Receiver fell behind and messages were skipped
    #[error("Subscription lagged, {0} messages skipped")]
    Lagged(u64),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

impl BusError {
    /// Check whether the subscription can keep receiving after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BusError::Lagged(_))
    }
}

/// Result type for message bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Subscription handle for receiving messages.
#[derive(Debug)]
pub struct Subscription {
    /// Subscription ID
    pub id: String,
    /// Topic pattern
    pub pattern: String,
    /// Message receiver
    pub receiver: broadcast::Receiver<BusMessage>,
}

impl Subscription {
    /// Receive the next message.
    ///
    /// A lagging receiver reports [`BusError::Lagged`] once and then resumes
    /// with the oldest message still buffered.
    pub async fn recv(&mut self) -> BusResult<BusMessage> {
        self.receiver.recv().await.map_err(|e| match e {
            RecvError::Lagged(skipped) => BusError::Lagged(skipped),
            RecvError::Closed => BusError::ChannelClosed,
        })
    }
}

/// Message bus trait for publish/subscribe operations.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a message. Returns once the transport has accepted it.
    async fn publish(&self, message: BusMessage) -> BusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Topic patterns support wildcards:
    /// - `+` matches exactly one level
    /// - `#` matches zero or more trailing levels
    ///
    /// Examples:
    /// - `doors/+/card_input` matches `doors/3/card_input`
    /// - `access_granted/#` matches `access_granted/3`
    async fn subscribe(&self, pattern: &str) -> BusResult<Subscription>;

    /// Unsubscribe from a topic.
    async fn unsubscribe(&self, subscription_id: &str) -> BusResult<()>;

    /// Get message bus stats.
    async fn stats(&self) -> BusStats;
}

/// Message bus statistics.
#[derive(Debug, Clone, Default)]
pub struct BusStats {
    /// Total messages published
    pub messages_published: u64,
    /// Total messages delivered to at least one subscriber
    pub messages_delivered: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
}

/// Check if a topic matches a subscription pattern.
///
/// Levels are separated by `/`. `+` matches one level, `#` matches the rest
/// of the topic including nothing at all.
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let topic_parts: Vec<&str> = topic.split('/').collect();

    for (idx, segment) in pattern_parts.iter().enumerate() {
        match *segment {
            "#" => return true,
            "+" => {
                if idx >= topic_parts.len() {
                    return false;
                }
            }
            literal => {
                if topic_parts.get(idx) != Some(&literal) {
                    return false;
                }
            }
        }
    }

    pattern_parts.len() == topic_parts.len()
}

/// In-memory message bus implementation.
///
/// This is suitable for single-process deployments and testing.
/// For distributed systems, use the Redis backend.
pub struct MemoryMessageBus {
    /// Pattern subscribers
    subscribers: Arc<RwLock<HashMap<String, broadcast::Sender<BusMessage>>>>,
    /// Subscription id to pattern
    subscriptions: Arc<RwLock<HashMap<String, String>>>,
    /// Statistics
    stats: Arc<RwLock<BusStats>>,
    /// Default channel capacity
    channel_capacity: usize,
}

impl std::fmt::Debug for MemoryMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMessageBus")
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl MemoryMessageBus {
    /// Create a new in-memory message bus.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(BusStats::default())),
            channel_capacity: capacity,
        }
    }
}

impl Default for MemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for MemoryMessageBus {
    async fn publish(&self, message: BusMessage) -> BusResult<()> {
        let mut delivered = false;

        {
            let subscribers = self.subscribers.read().await;
            for (pattern, sender) in subscribers.iter() {
                if topic_matches(pattern, &message.topic) && sender.send(message.clone()).is_ok() {
                    delivered = true;
                }
            }
        }

        // Update stats
        {
            let mut stats = self.stats.write().await;
            stats.messages_published += 1;
            if delivered {
                stats.messages_delivered += 1;
            }
        }

        tracing::trace!(topic = %message.topic, message_id = %message.id, delivered, "Published message");

        Ok(())
    }

    async fn subscribe(&self, pattern: &str) -> BusResult<Subscription> {
        let id = uuid::Uuid::now_v7().to_string();

        let receiver = {
            let mut subscribers = self.subscribers.write().await;

            let receiver = if let Some(sender) = subscribers.get(pattern) {
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(self.channel_capacity);
                subscribers.insert(pattern.to_string(), sender);
                receiver
            };

            self.subscriptions
                .write()
                .await
                .insert(id.clone(), pattern.to_string());

            receiver
        };

        // Update stats
        {
            let mut stats = self.stats.write().await;
            stats.active_subscriptions += 1;
        }

        Ok(Subscription {
            id,
            pattern: pattern.to_string(),
            receiver,
        })
    }

    async fn unsubscribe(&self, subscription_id: &str) -> BusResult<()> {
        let mut subscribers = self.subscribers.write().await;
        let mut subscriptions = self.subscriptions.write().await;

        let Some(pattern) = subscriptions.remove(subscription_id) else {
            return Ok(());
        };

        // Last subscription on this pattern: drop the sender so the pattern
        // stops matching and any leftover receivers see the channel close.
        if !subscriptions.values().any(|p| *p == pattern) {
            subscribers.remove(&pattern);
        }

        let mut stats = self.stats.write().await;
        stats.active_subscriptions = stats.active_subscriptions.saturating_sub(1);

        Ok(())
    }

    async fn stats(&self) -> BusStats {
        self.stats.read().await.clone()
    }
}

// ============================================================================
// Tests
// ============================================================================
