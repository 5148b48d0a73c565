//! Credential store seams.
//!
//! A [`CredentialStore`] hands out [`StoreSession`]s. Each session owns one
//! connection for the duration of one inbound event (or one admin request)
//! and gives it back when dropped, whichever way the work ends.

use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use gatekeeper_model::{AccessEvent, AccessEventFilter, CredentialRecord, Door, NewUser, User, UserId, UserPatch};

/// Source of store sessions.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Check out a session bound to one connection.
    async fn checkout(&self) -> StoreResult<Box<dyn StoreSession>>;
}

/// Queries available while a connection is checked out.
///
/// Implementations must bind every caller-supplied value as a query
/// parameter.
#[async_trait]
pub trait StoreSession: Send {
    /// Allow-list of a door in stored order. Unknown doors yield an empty list.
    async fn door_allow_list(&mut self, door_id: &str) -> StoreResult<Vec<UserId>>;

    /// Active RFID record for a card uid whose owner is an active user.
    async fn find_active_rfid(&mut self, uid: &str) -> StoreResult<Option<CredentialRecord>>;

    /// All active PIN records of active users, in store iteration order.
    async fn list_active_pins(&mut self) -> StoreResult<Vec<CredentialRecord>>;

    /// Append one audit event.
    async fn insert_access_event(&mut self, event: &AccessEvent) -> StoreResult<()>;

    /// Read back audit events, newest first.
    async fn list_access_events(&mut self, filter: &AccessEventFilter) -> StoreResult<Vec<AccessEvent>>;

    // Administration

    /// Users, highest id first, at most `limit` clamped to
    /// `1..=`[`MAX_USER_PAGE`].
    async fn list_users(&mut self, limit: u32) -> StoreResult<Vec<User>>;

    /// Create a user. Without an explicit id the next free id is taken.
    async fn insert_user(&mut self, user: &NewUser) -> StoreResult<User>;

    /// Apply a partial update. `None` when the user does not exist.
    async fn update_user(&mut self, id: UserId, patch: &UserPatch) -> StoreResult<Option<User>>;

    /// Delete a user. Returns whether a row was removed.
    async fn delete_user(&mut self, id: UserId) -> StoreResult<bool>;

    /// Every door, ordered by id.
    async fn list_doors(&mut self) -> StoreResult<Vec<Door>>;

    /// Create or replace a door allow-list.
    async fn put_door(&mut self, door: &Door) -> StoreResult<()>;

    /// Delete a door. Returns whether a row was removed.
    async fn delete_door(&mut self, door_id: &str) -> StoreResult<bool>;
}

/// Largest user page the store returns.
pub const MAX_USER_PAGE: u32 = 100;

/// Parse a stored allow-list.
///
/// Accepts the JSON array written by the admin API, with entries as numbers
/// or numeric strings (`[10,22]`, `["10","22"]`), and the legacy bare comma
/// list (`10,22`). Anything else is a decode error.
pub fn parse_allow_list(raw: &str) -> StoreResult<Vec<UserId>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    if raw.starts_with('[') {
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(raw).map_err(|e| StoreError::Decode(format!("allow-list: {}", e)))?;
        return entries.iter().map(json_user_id).collect();
    }

    raw.split(',')
        .map(str::trim)
        .map(|item| {
            item.parse::<UserId>()
                .map_err(|e| StoreError::Decode(format!("allow-list entry {:?}: {}", item, e)))
        })
        .collect()
}

fn json_user_id(entry: &serde_json::Value) -> StoreResult<UserId> {
    let parsed = match entry {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse::<UserId>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| StoreError::Decode(format!("allow-list entry {}", entry)))
}
