//! Error types for credential resolution and authorization
//!
//! An unknown credential is not an error: it resolves to
//! `ResolvedIdentity::Unknown` and ends in a denial. Errors here are the
//! cases where no trustworthy decision could be computed.

use gatekeeper_store::StoreError;
use thiserror::Error;

/// Resolution and authorization error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Credential store query failed
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// Presented credential cannot be evaluated at all
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Hashing a PIN failed
    #[error("Hashing failed: {0}")]
    Hashing(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for resolution and authorization.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Check if the failure came from the credential store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, AuthError::Store(_))
    }

    /// Get error code for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Store(_) => "STORE_UNAVAILABLE",
            AuthError::InvalidCredential(_) => "INVALID_CREDENTIAL",
            AuthError::Hashing(_) => "HASHING_FAILED",
            AuthError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
