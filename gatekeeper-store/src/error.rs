//! Error types for credential store operations.

use thiserror::Error;

/// Credential store error types.
///
/// Every variant is a store failure from the gateway's point of view and
/// leads to a fail-safe deny. `Conflict` only comes out of administration.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store could not be reached or no connection was available
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Query was rejected by the store
    #[error("Query failed: {0}")]
    Query(String),

    /// A stored value could not be decoded
    #[error("Failed to decode stored value: {0}")]
    Decode(String),

    /// Insert clashed with an existing row
    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Result type for credential store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::Decode(err.to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Conflict(err.to_string()),
            other => StoreError::Query(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_error_mapping() {
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::ColumnNotFound("uid".to_string())),
            StoreError::Decode(_)
        ));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Query(_)
        ));
    }
}
