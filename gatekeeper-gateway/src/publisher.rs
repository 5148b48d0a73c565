//! Decision publisher.
//!
//! Publishes the literal `granted` / `denied` on `<prefix><door_id>`, where
//! the prefix depends on the outcome. Events that arrived on a per-door
//! topic are answered on `<base>/<door_id>/access_granted` or
//! `<base>/<door_id>/access_denied` instead.

use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::inbound::DoorAddressing;
use gatekeeper_bus::{BusMessage, MessageBus, QoS};
use gatekeeper_model::Decision;
use std::sync::Arc;
use tracing::info;

/// Leaf of the per-door granted topic.
pub const DOOR_GRANTED_LEAF: &str = "access_granted";
/// Leaf of the per-door denied topic.
pub const DOOR_DENIED_LEAF: &str = "access_denied";

/// Publishes decisions to door topics.
#[derive(Clone)]
pub struct DecisionPublisher {
    bus: Arc<dyn MessageBus>,
    granted_prefix: String,
    denied_prefix: String,
    door_topic_base: Option<String>,
    qos: QoS,
}

impl std::fmt::Debug for DecisionPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPublisher")
            .field("granted_prefix", &self.granted_prefix)
            .field("denied_prefix", &self.denied_prefix)
            .field("door_topic_base", &self.door_topic_base)
            .field("qos", &self.qos)
            .finish()
    }
}

impl DecisionPublisher {
    /// Create a publisher with explicit topic prefixes.
    pub fn new(bus: Arc<dyn MessageBus>, granted_prefix: impl Into<String>, denied_prefix: impl Into<String>) -> Self {
        Self {
            bus,
            granted_prefix: granted_prefix.into(),
            denied_prefix: denied_prefix.into(),
            door_topic_base: None,
            qos: QoS::AtLeastOnce,
        }
    }

    /// Answer per-door events under `base`. An empty base leaves every
    /// answer on the prefixed topics.
    pub fn with_door_topic_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.door_topic_base = (!base.is_empty()).then_some(base);
        self
    }

    /// Create a publisher using the configured prefixes and door topic base.
    pub fn from_config(bus: Arc<dyn MessageBus>, config: &GatewayConfig) -> Self {
        Self::new(bus, config.granted_topic_prefix.clone(), config.denied_topic_prefix.clone())
            .with_door_topic_base(config.door_topic_base.clone())
    }

    /// Topic a decision for `door_id` goes to.
    pub fn topic_for(&self, door_id: &str, decision: Decision, addressing: DoorAddressing) -> String {
        if let (DoorAddressing::Topic, Some(base)) = (addressing, &self.door_topic_base) {
            let leaf = match decision {
                Decision::Granted => DOOR_GRANTED_LEAF,
                Decision::Denied => DOOR_DENIED_LEAF,
            };
            return format!("{}/{}/{}", base, door_id, leaf);
        }

        let prefix = match decision {
            Decision::Granted => &self.granted_prefix,
            Decision::Denied => &self.denied_prefix,
        };
        format!("{}{}", prefix, door_id)
    }

    /// Publish a decision and wait for the transport to accept it.
    pub async fn publish(&self, door_id: &str, decision: Decision, addressing: DoorAddressing) -> GatewayResult<()> {
        let topic = self.topic_for(door_id, decision, addressing);
        let message = BusMessage::new(topic.as_str(), decision.as_str()).with_qos(self.qos);

        self.bus.publish(message).await?;

        info!(door_id = %door_id, topic = %topic, decision = %decision, "Decision published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_bus::MemoryMessageBus;
    use std::time::Duration;

    #[test]
    fn test_topic_for() {
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryMessageBus::new());
        let publisher = DecisionPublisher::new(bus, "access_granted/", "access_denied/");

        assert_eq!(
            publisher.topic_for("3", Decision::Granted, DoorAddressing::Payload),
            "access_granted/3"
        );
        assert_eq!(
            publisher.topic_for("3", Decision::Denied, DoorAddressing::Payload),
            "access_denied/3"
        );
        assert_eq!(
            publisher.topic_for("3", Decision::Denied, DoorAddressing::Topic),
            "access_denied/3"
        );
    }

    #[test]
    fn test_topic_for_door_scoped() {
        let bus: Arc<dyn MessageBus> = Arc::new(MemoryMessageBus::new());
        let publisher = DecisionPublisher::from_config(bus, &GatewayConfig::default());

        assert_eq!(
            publisher.topic_for("lobby", Decision::Granted, DoorAddressing::Topic),
            "doors/lobby/access_granted"
        );
        assert_eq!(
            publisher.topic_for("lobby", Decision::Denied, DoorAddressing::Topic),
            "doors/lobby/access_denied"
        );
        assert_eq!(
            publisher.topic_for("lobby", Decision::Granted, DoorAddressing::Payload),
            "access_granted/lobby"
        );
    }

    #[tokio::test]
    async fn test_publish() {
        let bus = Arc::new(MemoryMessageBus::new());
        let mut subscription = bus.subscribe("access_denied/+").await.unwrap();
        let publisher = DecisionPublisher::from_config(bus.clone(), &GatewayConfig::default());

        publisher.publish("7", Decision::Denied, DoorAddressing::Payload).await.unwrap();

        let message = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.topic, "access_denied/7");
        assert_eq!(message.payload, "denied");
        assert_eq!(message.qos, QoS::AtLeastOnce);
    }
}
