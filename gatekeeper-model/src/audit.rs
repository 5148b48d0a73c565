//! # Access Events
//!
//! One `AccessEvent` is written per processed inbound message. Events are
//! immutable once created; nothing in the gateway updates or deletes them.

use crate::{CredentialKind, Decision, DecisionReason, ResolvedIdentity, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit record of one decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    /// Unique event id
    pub id: Uuid,

    /// Door the credential was presented at
    pub door_id: String,

    /// Resolved user, `None` when the credential was unknown
    pub user_id: Option<UserId>,

    /// Kind of credential presented
    pub credential_kind: CredentialKind,

    /// RFID uid as presented, or a fresh hash of the presented PIN
    pub credential_payload: String,

    /// Outcome
    pub decision: Decision,

    /// Denial reason, `None` for granted events
    pub reason: Option<DecisionReason>,

    /// When the decision was made
    pub timestamp: DateTime<Utc>,
}

impl AccessEvent {
    /// Create a new event stamped now.
    ///
    /// # Arguments
    ///
    /// * `door_id` - Door the credential was presented at
    /// * `identity` - Resolution outcome; unknown maps to a null user
    /// * `credential_kind` - RFID or PIN
    /// * `credential_payload` - Audit form of the credential (never a raw PIN)
    /// * `decision` - Granted or denied
    pub fn new(
        door_id: impl Into<String>,
        identity: ResolvedIdentity,
        credential_kind: CredentialKind,
        credential_payload: impl Into<String>,
        decision: Decision,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            door_id: door_id.into(),
            user_id: identity.user_id(),
            credential_kind,
            credential_payload: credential_payload.into(),
            decision,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a denial reason.
    pub fn with_reason(mut self, reason: Option<DecisionReason>) -> Self {
        self.reason = reason;
        self
    }
}

/// Filter for reading back the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEventFilter {
    /// Only events with this decision
    pub decision: Option<Decision>,
    /// Only events for this credential kind
    pub credential_kind: Option<CredentialKind>,
    /// Only events at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Only events at or before this instant
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events returned
    pub limit: u32,
}

impl AccessEventFilter {
    /// Default page size.
    pub const DEFAULT_LIMIT: u32 = 100;
    /// Largest page size honoured.
    pub const MAX_LIMIT: u32 = 500;

    /// Create an unfiltered query with the default limit.
    pub fn new() -> Self {
        Self {
            decision: None,
            credential_kind: None,
            from: None,
            to: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }

    /// Only events with this decision.
    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Only events for this credential kind.
    pub fn with_credential_kind(mut self, kind: CredentialKind) -> Self {
        self.credential_kind = Some(kind);
        self
    }

    /// Only events inside `[from, to]`.
    pub fn between(mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Set the page size. Zero falls back to the default, anything above the
    /// maximum is clamped.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Page size after defaulting and clamping.
    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            0 => Self::DEFAULT_LIMIT,
            n => n.min(Self::MAX_LIMIT),
        }
    }

    /// Check whether an event passes the filter (limit not applied).
    pub fn matches(&self, event: &AccessEvent) -> bool {
        self.decision.map_or(true, |d| d == event.decision)
            && self.credential_kind.map_or(true, |k| k == event.credential_kind)
            && self.from.map_or(true, |from| event.timestamp >= from)
            && self.to.map_or(true, |to| event.timestamp <= to)
    }
}

impl Default for AccessEventFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_identity_has_null_user() {
        let event = AccessEvent::new(
            "3",
            ResolvedIdentity::Unknown,
            CredentialKind::Rfid,
            "FFFF",
            Decision::Denied,
        )
        .with_reason(Some(DecisionReason::RfidNotFound));

        assert_eq!(event.user_id, None);
        assert_eq!(event.reason, Some(DecisionReason::RfidNotFound));
    }

    #[test]
    fn test_identical_events_have_distinct_ids() {
        let a = AccessEvent::new("3", ResolvedIdentity::User(22), CredentialKind::Rfid, "AB12", Decision::Granted);
        let b = AccessEvent::new("3", ResolvedIdentity::User(22), CredentialKind::Rfid, "AB12", Decision::Granted);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_filter_limit_clamping() {
        assert_eq!(AccessEventFilter::new().effective_limit(), 100);
        assert_eq!(AccessEventFilter::new().with_limit(0).effective_limit(), 100);
        assert_eq!(AccessEventFilter::new().with_limit(42).effective_limit(), 42);
        assert_eq!(AccessEventFilter::new().with_limit(10_000).effective_limit(), 500);
    }

    #[test]
    fn test_filter_matches() {
        let event = AccessEvent::new("3", ResolvedIdentity::User(22), CredentialKind::Pin, "hash", Decision::Denied);

        assert!(AccessEventFilter::new().matches(&event));
        assert!(AccessEventFilter::new().with_decision(Decision::Denied).matches(&event));
        assert!(!AccessEventFilter::new().with_decision(Decision::Granted).matches(&event));
        assert!(!AccessEventFilter::new()
            .with_credential_kind(CredentialKind::Rfid)
            .matches(&event));

        let later = event.timestamp + chrono::Duration::seconds(60);
        assert!(!AccessEventFilter::new().between(Some(later), None).matches(&event));
        assert!(AccessEventFilter::new().between(None, Some(later)).matches(&event));
    }
}
