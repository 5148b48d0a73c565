//! # Gatekeeper Model
//!
//! Shared data types for the gatekeeper access gateway.
//!
//! ## Overview
//!
//! The gatekeeper-model crate defines:
//! - **Doors**: A door id and its flat allow-list of user ids
//! - **Users**: Credential owners; only active users' credentials resolve
//! - **Credentials**: What was presented at the reader (RFID uid or PIN code)
//! - **Credential Records**: Persisted credentials owned by a user
//! - **Decisions**: The granted/denied outcome and the reason behind a denial
//! - **Access Events**: The immutable audit record written for every decision
//!
//! ## Decision Rule
//!
//! ```text
//! granted  <=>  identity resolved (active credential, active user)  AND  identity in door allow-list
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use gatekeeper_model::{Credential, Door, ResolvedIdentity};
//!
//! let door = Door::new("3", vec![10, 22]);
//!
//! assert!(door.allows(&ResolvedIdentity::User(22)));
//! assert!(!door.allows(&ResolvedIdentity::Unknown));
//!
//! let credential = Credential::pin("4321");
//! assert!(!format!("{:?}", credential).contains("4321"));
//! ```

pub mod audit;
pub mod credential;
pub mod decision;
pub mod door;
pub mod user;

// Re-export main types for convenience
pub use audit::{AccessEvent, AccessEventFilter};
pub use credential::{Credential, CredentialKind, CredentialRecord};
pub use decision::{Decision, DecisionReason, ResolvedIdentity};
pub use door::Door;
pub use user::{NewUser, User, UserPatch};

/// Persisted user identifier.
pub type UserId = i64;
