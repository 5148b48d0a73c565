//! # Gatekeeper Bus
//!
//! Publish/subscribe transport between door hardware and the gateway.
//!
//! ## Overview
//!
//! The gatekeeper-bus crate handles:
//! - **Messages**: Topic + raw string payload + delivery guarantee
//! - **Message Bus**: Publish/subscribe with topic wildcards
//! - **Backends**: In-memory for single-process use, Redis for deployments
//!
//! ## Features
//!
//! - `memory` (default): In-memory message bus
//! - `redis`: Redis pub/sub message bus
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gatekeeper_bus::{BusMessage, MemoryMessageBus, MessageBus};
//!
//! async fn example() {
//!     let bus = MemoryMessageBus::new();
//!
//!     // Door 3 listens for its decisions
//!     let mut decisions = bus.subscribe("access_granted/3").await.unwrap();
//!
//!     bus.publish(BusMessage::new("access_granted/3", "granted")).await.unwrap();
//!
//!     let message = decisions.recv().await.unwrap();
//!     assert_eq!(message.payload, "granted");
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are `/`-separated levels:
//! - `card_input` - Specific topic
//! - `doors/+/card_input` - Card taps from any door
//! - `access_denied/#` - Every denial
//!
//! Wildcards:
//! - `+` matches exactly one level
//! - `#` matches zero or more trailing levels

pub mod bus;
pub mod message;

#[cfg(feature = "redis")]
pub mod redis;

// Re-export main types
pub use bus::{topic_matches, BusError, BusResult, BusStats, MemoryMessageBus, MessageBus, Subscription};
pub use message::{BusMessage, QoS};

#[cfg(feature = "redis")]
pub use redis::RedisMessageBus;
