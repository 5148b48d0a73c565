//! User administration endpoints.
//!
//! Deactivating a user stops every card and PIN they hold from resolving;
//! the credential rows themselves are left alone.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use gatekeeper_model::{NewUser, User, UserId, UserPatch};
use gatekeeper_store::{StoreSession, MAX_USER_PAGE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AdminError, AdminResult};
use crate::AdminState;

/// Body of `POST /api/admin/users`.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Explicit id; the next free id when absent
    pub id: Option<UserId>,
    /// Display name, required
    pub full_name: Option<String>,
    /// Defaults to active
    pub active: Option<bool>,
}

/// Body of `PATCH /api/admin/users/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub active: Option<bool>,
}

/// Query parameters for `GET /api/admin/users`.
#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub limit: Option<u32>,
}

fn parse_user_id(raw: &str) -> AdminResult<UserId> {
    raw.trim()
        .parse()
        .map_err(|_| AdminError::bad_request("bad_id", format!("not a user id: {}", raw)))
}

/// List users, highest id first.
pub async fn list_users(
    State(state): State<AdminState>,
    Query(query): Query<UsersQuery>,
) -> AdminResult<Json<Vec<User>>> {
    let mut session = state.store.checkout().await?;
    let users = session.list_users(query.limit.unwrap_or(MAX_USER_PAGE)).await?;
    Ok(Json(users))
}

/// Create a user.
pub async fn create_user(
    State(state): State<AdminState>,
    Json(req): Json<CreateUserRequest>,
) -> AdminResult<(StatusCode, Json<User>)> {
    let full_name = req
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| AdminError::bad_request("full_name_required", "full_name must be a non-empty string"))?;

    let new_user = NewUser {
        id: req.id,
        full_name: full_name.to_string(),
        active: req.active.unwrap_or(true),
    };

    let mut session = state.store.checkout().await?;
    let user = session.insert_user(&new_user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Rename, deactivate or reactivate a user.
pub async fn update_user(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> AdminResult<Json<User>> {
    let id = parse_user_id(&id)?;
    let patch = UserPatch {
        full_name: req.full_name.map(|name| name.trim().to_string()),
        active: req.active,
    };
    if patch.is_empty() {
        return Err(AdminError::bad_request("no_fields", "nothing to update"));
    }

    let mut session = state.store.checkout().await?;
    session
        .update_user(id, &patch)
        .await?
        .map(Json)
        .ok_or_else(|| AdminError::NotFound(format!("user {}", id)))
}

/// Delete a user.
pub async fn delete_user(State(state): State<AdminState>, Path(id): Path<String>) -> AdminResult<Json<Value>> {
    let id = parse_user_id(&id)?;
    let mut session = state.store.checkout().await?;
    if !session.delete_user(id).await? {
        return Err(AdminError::NotFound(format!("user {}", id)));
    }
    Ok(Json(json!({ "ok": true })))
}
