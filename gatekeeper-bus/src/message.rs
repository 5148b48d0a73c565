//! Message envelope carried over the bus.
//!
//! Readers and door controllers speak plain strings, so the payload is a
//! `String` rather than structured JSON. The envelope adds the metadata the
//! gateway needs for routing and tracing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery guarantee requested for a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce,
    /// Delivered one or more times.
    #[default]
    AtLeastOnce,
    /// Delivered exactly once.
    ExactlyOnce,
}

impl QoS {
    /// Numeric level as used by MQTT-style brokers.
    pub fn level(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }

    /// Parse from a numeric level.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(QoS::AtMostOnce),
            1 => Some(QoS::AtLeastOnce),
            2 => Some(QoS::ExactlyOnce),
            _ => None,
        }
    }
}

/// Message published on or received from the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Unique message ID
    pub id: Uuid,

    /// Topic, `/`-separated (e.g., `access_granted/3`)
    pub topic: String,

    /// Raw payload string
    pub payload: String,

    /// Requested delivery guarantee
    pub qos: QoS,

    /// Timestamp when the message was created
    pub timestamp: DateTime<Utc>,
}

impl BusMessage {
    /// Create a new message with at-least-once delivery.
    ///
    /// # Arguments
    ///
    /// * `topic` - Destination topic
    /// * `payload` - Raw payload string
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::default(),
            timestamp: Utc::now(),
        }
    }

    /// Set the delivery guarantee.
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let message = BusMessage::new("access_granted/3", "granted");
        assert_eq!(message.topic, "access_granted/3");
        assert_eq!(message.payload, "granted");
        assert_eq!(message.qos, QoS::AtLeastOnce);
    }

    #[test]
    fn test_qos_levels() {
        assert_eq!(QoS::AtLeastOnce.level(), 1);
        assert_eq!(QoS::from_level(0), Some(QoS::AtMostOnce));
        assert_eq!(QoS::from_level(3), None);
    }
}
