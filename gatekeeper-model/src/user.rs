//! # Users
//!
//! Credentials belong to users. A deactivated user keeps their cards and PIN
//! records, but none of them resolve until the user is reactivated.

use crate::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Person that owns credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id referenced by credentials and door allow-lists
    pub id: UserId,

    /// Display name
    pub full_name: String,

    /// Whether the user's credentials may resolve
    pub active: bool,

    /// When the user was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create an active user stamped now.
    pub fn new(id: UserId, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Mark the user as inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(full_name) = &patch.full_name {
            self.full_name = full_name.clone();
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
    }
}

/// Fields for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Explicit id, or `None` to take the next free one
    pub id: Option<UserId>,
    /// Display name
    pub full_name: String,
    /// Initial active flag
    pub active: bool,
}

/// Partial update of a user. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    /// New display name
    pub full_name: Option<String>,
    /// New active flag
    pub active: Option<bool>,
}

impl UserPatch {
    /// Check whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.active.is_none()
    }
}
