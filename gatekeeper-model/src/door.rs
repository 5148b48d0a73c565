//! # Doors
//!
//! A door is an opaque id with a flat allow-list of user ids. There are no
//! roles, wildcards or schedules: a user is either on the list or not.

use crate::{ResolvedIdentity, UserId};
use serde::{Deserialize, Serialize};

/// Door and the users allowed through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    /// Door id as carried in reader payloads.
    pub id: String,
    /// Allowed users, in stored order.
    pub allowed_user_ids: Vec<UserId>,
}

impl Door {
    /// Create a door.
    pub fn new(id: impl Into<String>, allowed_user_ids: Vec<UserId>) -> Self {
        Self {
            id: id.into(),
            allowed_user_ids,
        }
    }

    /// Check whether a user id is on the allow-list.
    pub fn permits(&self, user_id: UserId) -> bool {
        self.allowed_user_ids.contains(&user_id)
    }

    /// Check whether a resolved identity may pass. Unknown never passes.
    pub fn allows(&self, identity: &ResolvedIdentity) -> bool {
        identity.user_id().is_some_and(|id| self.permits(id))
    }
}
