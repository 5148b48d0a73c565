//! # Decisions
//!
//! Outcome of evaluating one presented credential at one door.

use crate::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity a credential resolved to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedIdentity {
    /// A concrete user owns the credential.
    User(UserId),
    /// No active credential matched.
    Unknown,
}

impl ResolvedIdentity {
    /// Get the user id, if resolved.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            ResolvedIdentity::User(id) => Some(*id),
            ResolvedIdentity::Unknown => None,
        }
    }

    /// Check whether resolution found a user.
    pub fn is_known(&self) -> bool {
        matches!(self, ResolvedIdentity::User(_))
    }
}

impl From<Option<UserId>> for ResolvedIdentity {
    fn from(user_id: Option<UserId>) -> Self {
        user_id.map_or(ResolvedIdentity::Unknown, ResolvedIdentity::User)
    }
}

/// Grant or deny.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Door may open.
    Granted,
    /// Door stays shut.
    Denied,
}

impl Decision {
    /// Get the wire/audit representation (`granted` / `denied`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Granted => "granted",
            Decision::Denied => "denied",
        }
    }

    /// Parse from the wire/audit representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "granted" => Some(Decision::Granted),
            "denied" => Some(Decision::Denied),
            _ => None,
        }
    }

    /// Check if the decision grants access.
    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a request was denied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No active RFID record for the presented uid.
    RfidNotFound,
    /// No active PIN hash verified against the presented code.
    PinNoMatch,
    /// Credential resolved to a user who is not on the door allow-list.
    NoAccessToDoor,
    /// The credential store failed; denied fail-safe.
    StoreUnavailable,
}

impl DecisionReason {
    /// Get the string representation stored in the audit trail.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::RfidNotFound => "rfid_not_found",
            DecisionReason::PinNoMatch => "pin_no_match",
            DecisionReason::NoAccessToDoor => "no_access_to_door",
            DecisionReason::StoreUnavailable => "store_unavailable",
        }
    }

    /// Parse from the stored string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rfid_not_found" => Some(DecisionReason::RfidNotFound),
            "pin_no_match" => Some(DecisionReason::PinNoMatch),
            "no_access_to_door" => Some(DecisionReason::NoAccessToDoor),
            "store_unavailable" => Some(DecisionReason::StoreUnavailable),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_strings() {
        assert_eq!(Decision::Granted.as_str(), "granted");
        assert_eq!(Decision::Denied.to_string(), "denied");
        assert_eq!(Decision::parse("granted"), Some(Decision::Granted));
        assert_eq!(Decision::parse("alarm"), None);
        assert!(Decision::Granted.is_granted());
        assert!(!Decision::Denied.is_granted());
    }

    #[test]
    fn test_resolved_identity() {
        assert_eq!(ResolvedIdentity::User(22).user_id(), Some(22));
        assert_eq!(ResolvedIdentity::Unknown.user_id(), None);
        assert_eq!(ResolvedIdentity::from(None), ResolvedIdentity::Unknown);
        assert!(ResolvedIdentity::from(Some(10)).is_known());
    }

    #[test]
    fn test_reason_roundtrip() {
        for reason in [
            DecisionReason::RfidNotFound,
            DecisionReason::PinNoMatch,
            DecisionReason::NoAccessToDoor,
            DecisionReason::StoreUnavailable,
        ] {
            assert_eq!(DecisionReason::parse(reason.as_str()), Some(reason));
        }
    }
}
