//! # Gatekeeper Gateway
//!
//! This crate turns reader events into door decisions.
//!
//! ## Overview
//!
//! The gatekeeper-gateway crate handles:
//! - **Inbound**: Parsing `"<identifier>,<door_id>"` payloads from the card and PIN topics,
//!   and bare identifiers from the per-door `doors/<door_id>/card_input|code_input` topics
//! - **Pipeline**: Resolve, authorize, audit and publish for one event
//! - **Audit**: One access event per decision, PIN codes stored hashed
//! - **Publishing**: `granted` / `denied` on `<prefix><door_id>`, or on
//!   `doors/<door_id>/access_granted|access_denied` for per-door events
//! - **Ingestion**: A bounded queue with a single consumer
//! - **Configuration**: `GATEKEEPER_*` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gatekeeper_auth::Argon2Verifier;
//! use gatekeeper_bus::{MemoryMessageBus, MessageBus};
//! use gatekeeper_gateway::{AccessPipeline, DecisionPublisher, GatewayConfig, IngestionLoop};
//! use gatekeeper_store::MemoryCredentialStore;
//! use std::sync::Arc;
//!
//! async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::default();
//!     let bus: Arc<dyn MessageBus> = Arc::new(MemoryMessageBus::new());
//!
//!     let pipeline = AccessPipeline::new(
//!         Arc::new(MemoryCredentialStore::new()),
//!         Arc::new(Argon2Verifier::new()),
//!         DecisionPublisher::from_config(bus.clone(), &config),
//!     );
//!
//!     let ingestion = IngestionLoop::from_config(bus, pipeline, &config);
//!     let subscriptions = ingestion.subscribe().await?;
//!     let stats = ingestion
//!         .run(subscriptions, async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!
//!     println!("Processed {} events", stats.received);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod inbound;
pub mod ingest;
pub mod pipeline;
pub mod publisher;

// Re-export main types
pub use audit::AuditLogger;
pub use config::{ConfigError, GatewayConfig};
pub use error::{GatewayError, GatewayResult};
pub use inbound::{DoorAddressing, InboundEvent, InboundKind, InboundRoute, InboundTopics};
pub use ingest::{IngestionLoop, IngestionStats};
pub use pipeline::{AccessPipeline, AuditStatus, ProcessedEvent};
pub use publisher::{DecisionPublisher, DOOR_DENIED_LEAF, DOOR_GRANTED_LEAF};
