//! Ingestion loop.
//!
//! Every inbound subscription forwards into one bounded queue drained by a
//! single consumer, so at most one event is inside the pipeline at any
//! time. Shutdown stops intake; the event in flight always completes.

use crate::config::GatewayConfig;
use crate::error::GatewayResult;
use crate::inbound::{InboundEvent, InboundTopics};
use crate::pipeline::{AccessPipeline, AuditStatus, ProcessedEvent};
use gatekeeper_bus::{BusError, BusMessage, MessageBus, Subscription};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

/// Counters kept by the consumer for one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionStats {
    /// Messages taken off the queue
    pub received: u64,
    /// Events decided `granted`
    pub granted: u64,
    /// Events decided `denied`
    pub denied: u64,
    /// Payloads or credentials rejected before the pipeline
    pub malformed: u64,
    /// Messages on topics the gateway does not handle
    pub unknown_topic: u64,
    /// Events denied because the store failed
    pub store_failures: u64,
    /// Failed audit writes
    pub audit_failures: u64,
    /// Failed decision publishes
    pub publish_failures: u64,
}

impl IngestionStats {
    /// Fold one processed event into the counters.
    pub fn record(&mut self, processed: &ProcessedEvent) {
        if processed.authorization.decision.is_granted() {
            self.granted += 1;
        } else {
            self.denied += 1;
        }
        if processed.store_failed() {
            self.store_failures += 1;
        }
        if processed.audit == AuditStatus::Failed {
            self.audit_failures += 1;
        }
        if !processed.published {
            self.publish_failures += 1;
        }
    }
}

/// Single-consumer ingestion loop.
pub struct IngestionLoop {
    bus: Arc<dyn MessageBus>,
    pipeline: AccessPipeline,
    topics: InboundTopics,
    queue_capacity: usize,
}

impl std::fmt::Debug for IngestionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionLoop")
            .field("topics", &self.topics)
            .field("queue_capacity", &self.queue_capacity)
            .finish_non_exhaustive()
    }
}

impl IngestionLoop {
    /// Create a loop consuming `topics` into a queue of `queue_capacity`.
    pub fn new(bus: Arc<dyn MessageBus>, pipeline: AccessPipeline, topics: InboundTopics, queue_capacity: usize) -> Self {
        Self {
            bus,
            pipeline,
            topics,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Create a loop from the gateway configuration.
    pub fn from_config(bus: Arc<dyn MessageBus>, pipeline: AccessPipeline, config: &GatewayConfig) -> Self {
        Self::new(
            bus,
            pipeline,
            InboundTopics::new(config.card_topic.clone(), config.pin_topic.clone())
                .with_door_base(config.door_topic_base.clone()),
            config.queue_capacity,
        )
    }

    /// Subscribe to the card and PIN topics, and their per-door forms when
    /// enabled.
    ///
    /// Failure here is fatal to the caller; nothing is processed without
    /// every subscription. Subscriptions taken before the failure are
    /// released.
    pub async fn subscribe(&self) -> GatewayResult<Vec<Subscription>> {
        let patterns = self.topics.patterns();
        let mut subscriptions = Vec::with_capacity(patterns.len());

        for pattern in &patterns {
            match self.bus.subscribe(pattern).await {
                Ok(subscription) => subscriptions.push(subscription),
                Err(e) => {
                    for taken in &subscriptions {
                        let _ = self.bus.unsubscribe(&taken.id).await;
                    }
                    return Err(e.into());
                }
            }
        }

        info!(patterns = ?patterns, "Subscribed to inbound topics");
        Ok(subscriptions)
    }

    /// Drain `subscriptions` until `shutdown` resolves or every subscription
    /// closes.
    pub async fn run<F>(self, subscriptions: Vec<Subscription>, shutdown: F) -> IngestionStats
    where
        F: Future<Output = ()> + Send,
    {
        let (queue_tx, mut queue_rx) = mpsc::channel::<BusMessage>(self.queue_capacity);
        let (stop_tx, _) = broadcast::channel::<()>(1);

        let mut subscription_ids = Vec::with_capacity(subscriptions.len());
        let mut forwarders = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            subscription_ids.push(subscription.id.clone());
            forwarders.push(tokio::spawn(forward(
                subscription,
                queue_tx.clone(),
                stop_tx.subscribe(),
            )));
        }
        drop(queue_tx);

        let mut stats = IngestionStats::default();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer accepting events");
                    break;
                }
                next = queue_rx.recv() => match next {
                    Some(message) => self.handle(&message, &mut stats).await,
                    None => {
                        warn!("All inbound subscriptions closed");
                        break;
                    }
                }
            }
        }

        let _ = stop_tx.send(());
        drop(queue_rx);

        for id in &subscription_ids {
            if let Err(e) = self.bus.unsubscribe(id).await {
                warn!(subscription_id = %id, error = %e, "Failed to unsubscribe");
            }
        }
        for forwarder in forwarders {
            if let Err(e) = forwarder.await {
                warn!(error = %e, "Forwarder task ended abnormally");
            }
        }

        info!(
            received = stats.received,
            granted = stats.granted,
            denied = stats.denied,
            malformed = stats.malformed,
            unknown_topic = stats.unknown_topic,
            store_failures = stats.store_failures,
            audit_failures = stats.audit_failures,
            publish_failures = stats.publish_failures,
            "Ingestion loop stopped"
        );

        stats
    }

    /// Process one message end to end.
    pub async fn handle(&self, message: &BusMessage, stats: &mut IngestionStats) {
        stats.received += 1;

        let route = match self.topics.classify(&message.topic) {
            Ok(route) => route,
            Err(e) => {
                warn!(topic = %message.topic, error = %e, "Dropping message");
                stats.unknown_topic += 1;
                return;
            }
        };

        let event = match InboundEvent::from_route(&route, &message.payload) {
            Ok(event) => event,
            Err(e) => {
                error!(topic = %message.topic, message_id = %message.id, error = %e, "Dropping inbound event");
                stats.malformed += 1;
                return;
            }
        };

        match self.pipeline.process(&event).await {
            Ok(processed) => stats.record(&processed),
            Err(e) => {
                error!(topic = %message.topic, door_id = %event.door_id, error = %e, "Dropping inbound event");
                stats.malformed += 1;
            }
        }
    }
}

async fn forward(mut subscription: Subscription, queue: mpsc::Sender<BusMessage>, mut stop: broadcast::Receiver<()>) {
    loop {
        tokio::select! {
            _ = stop.recv() => break,
            received = subscription.recv() => match received {
                Ok(message) => {
                    if queue.send(message).await.is_err() {
                        break;
                    }
                }
                Err(BusError::Lagged(skipped)) => {
                    warn!(pattern = %subscription.pattern, skipped, "Inbound subscription lagged, events lost");
                }
                Err(e) => {
                    error!(pattern = %subscription.pattern, error = %e, "Inbound subscription closed");
                    break;
                }
            }
        }
    }
}
