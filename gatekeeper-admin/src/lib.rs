//! # Gatekeeper Admin
//!
//! HTTP administration API next to the access gateway.
//!
//! ## Routes
//!
//! | Method | Path | |
//! |--------|------|-|
//! | `GET` | `/api/health` | Liveness, `{"ok":true}` |
//! | `GET` | `/api/admin/events` | Audit trail, filtered by `result`, `credential_type`, `from`, `to`, `limit` |
//! | `GET` `POST` | `/api/admin/users` | List or create users |
//! | `PATCH` `DELETE` | `/api/admin/users/:id` | Update or delete a user |
//! | `GET` | `/api/admin/doors` | List doors |
//! | `PUT` `DELETE` | `/api/admin/doors/:id` | Replace or delete a door allow-list |
//!
//! Every request checks out its own store session. Errors come back as
//! `{"error": "<code>", "message": "..."}`.

pub mod doors;
pub mod error;
pub mod events;
pub mod users;

pub use error::{AdminError, AdminResult, ApiError};

use axum::{
    routing::{get, patch, put},
    Json, Router,
};
use gatekeeper_store::CredentialStore;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// State shared by every handler.
#[derive(Clone)]
pub struct AdminState {
    pub store: Arc<dyn CredentialStore>,
}

/// Build the admin router over `store`.
pub fn router(store: Arc<dyn CredentialStore>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/admin/events", get(events::list_events))
        .route("/api/admin/users", get(users::list_users).post(users::create_user))
        .route("/api/admin/users/:id", patch(users::update_user).delete(users::delete_user))
        .route("/api/admin/doors", get(doors::list_doors))
        .route("/api/admin/doors/:id", put(doors::put_door).delete(doors::delete_door))
        .with_state(AdminState { store })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
}

/// Serve the admin API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, store: Arc<dyn CredentialStore>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
