//! # Gatekeeper Authentication
//!
//! Credential resolution and door authorization for the gatekeeper gateway.
//!
//! ## Overview
//!
//! The gatekeeper-auth crate handles:
//! - **Hashing**: Salted PIN hashes and verification (`HashVerifier`)
//! - **Resolution**: Presented credential to user identity (`CredentialResolver`)
//! - **Authorization**: Identity plus door allow-list to a decision (`AuthorizationEngine`)
//!
//! ## Features
//!
//! - `argon2` (default): Argon2id `HashVerifier` implementation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gatekeeper_auth::{Argon2Verifier, AuthorizationEngine, CredentialResolver};
//! use gatekeeper_model::{Credential, Decision};
//! use gatekeeper_store::{CredentialStore, MemoryCredentialStore};
//! use std::sync::Arc;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryCredentialStore::new();
//!     let resolver = CredentialResolver::new(Arc::new(Argon2Verifier::new()));
//!     let engine = AuthorizationEngine::new();
//!
//!     let credential = Credential::rfid("AB12");
//!     let mut session = store.checkout().await?;
//!     let identity = resolver.resolve(session.as_mut(), &credential, "3").await?;
//!     let authorization = engine
//!         .authorize(session.as_mut(), "3", identity, credential.kind())
//!         .await?;
//!
//!     assert_eq!(authorization.decision, Decision::Denied);
//!     Ok(())
//! }
//! ```

pub mod authorize;
pub mod error;
pub mod hash;
pub mod resolver;

// Re-export main types
pub use authorize::{Authorization, AuthorizationEngine};
pub use error::{AuthError, AuthResult};
pub use hash::{hash_blocking, HashVerifier};
pub use resolver::{first_verifying, CredentialResolver, MAX_IDENTIFIER_LEN};

#[cfg(feature = "argon2")]
pub use hash::Argon2Verifier;
