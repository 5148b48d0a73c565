//! Error types for the admin API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gatekeeper_store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Machine-readable code, e.g. `not_found`
    pub error: String,
    /// Human-readable detail
    pub message: String,
}

/// Admin API error types.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Request failed validation; carries the error code
    #[error("Bad request ({code}): {message}")]
    BadRequest { code: &'static str, message: String },

    /// Addressed user or door does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credential store failure
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for admin handlers.
pub type AdminResult<T> = Result<T, AdminError>;

impl AdminError {
    /// Create a validation error.
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        AdminError::BadRequest {
            code,
            message: message.into(),
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AdminError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            AdminError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AdminError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error code carried in the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AdminError::BadRequest { code, .. } => *code,
            AdminError::NotFound(_) => "not_found",
            AdminError::Store(StoreError::Conflict(_)) => "conflict",
            AdminError::Store(StoreError::Unavailable(_)) => "store_unavailable",
            AdminError::Store(_) => "db_error",
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "Admin request failed");
        }

        let body = ApiError {
            error: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
