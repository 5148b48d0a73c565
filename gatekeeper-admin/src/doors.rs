//! Door allow-list endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use gatekeeper_model::{Door, UserId};
use gatekeeper_store::StoreSession;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AdminError, AdminResult};
use crate::AdminState;

/// Body of `PUT /api/admin/doors/:id`.
#[derive(Debug, Deserialize)]
pub struct PutDoorRequest {
    pub allowed_user_ids: Vec<UserId>,
}

/// List every door with its allow-list.
pub async fn list_doors(State(state): State<AdminState>) -> AdminResult<Json<Vec<Door>>> {
    let mut session = state.store.checkout().await?;
    Ok(Json(session.list_doors().await?))
}

/// Create a door or replace its allow-list.
pub async fn put_door(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(req): Json<PutDoorRequest>,
) -> AdminResult<Json<Door>> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AdminError::bad_request("bad_id", "door id must not be empty"));
    }

    let door = Door::new(id, req.allowed_user_ids);
    let mut session = state.store.checkout().await?;
    session.put_door(&door).await?;
    Ok(Json(door))
}

/// Delete a door. Readers at a deleted door are denied from then on.
pub async fn delete_door(State(state): State<AdminState>, Path(id): Path<String>) -> AdminResult<Json<Value>> {
    let mut session = state.store.checkout().await?;
    if !session.delete_door(&id).await? {
        return Err(AdminError::NotFound(format!("door {}", id)));
    }
    Ok(Json(json!({ "ok": true })))
}
