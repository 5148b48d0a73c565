//! Gateway error types.

use crate::config::ConfigError;
use gatekeeper_auth::AuthError;
use gatekeeper_bus::BusError;
use gatekeeper_store::StoreError;
use thiserror::Error;

/// Gateway error types.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Inbound payload did not split into an identifier and a door id
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Message arrived on a topic the gateway does not handle
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    /// Identifier rejected before resolution
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Credential store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Message bus failure
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    /// Resolution or hashing failure
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl GatewayError {
    /// Whether the event was rejected before reaching the store.
    pub fn is_rejected_input(&self) -> bool {
        matches!(
            self,
            GatewayError::MalformedPayload(_) | GatewayError::UnknownTopic(_) | GatewayError::InvalidCredential(_)
        )
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
