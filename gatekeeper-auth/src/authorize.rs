//! Door authorization.
//!
//! A door's allow-list is a flat set of user ids. Access is granted only
//! when the credential resolved to a user and that user is on the list.

use crate::error::AuthResult;
use gatekeeper_model::{CredentialKind, Decision, DecisionReason, Door, ResolvedIdentity};
use gatekeeper_store::StoreSession;

/// Result of evaluating one identity at one door.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authorization {
    /// Granted or denied
    pub decision: Decision,
    /// Why access was denied; `None` when granted
    pub reason: Option<DecisionReason>,
}

impl Authorization {
    /// Granted access.
    pub fn granted() -> Self {
        Self {
            decision: Decision::Granted,
            reason: None,
        }
    }

    /// Denied access for a reason.
    pub fn denied(reason: DecisionReason) -> Self {
        Self {
            decision: Decision::Denied,
            reason: Some(reason),
        }
    }
}

/// Evaluates resolved identities against door allow-lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationEngine;

impl AuthorizationEngine {
    /// Create an engine.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate an identity against an already loaded door.
    pub fn evaluate(&self, door: &Door, identity: ResolvedIdentity, kind: CredentialKind) -> Authorization {
        match identity {
            ResolvedIdentity::Unknown => Authorization::denied(unknown_reason(kind)),
            ResolvedIdentity::User(_) if door.allows(&identity) => Authorization::granted(),
            ResolvedIdentity::User(_) => Authorization::denied(DecisionReason::NoAccessToDoor),
        }
    }

    /// Fetch the door's allow-list and evaluate the identity against it.
    ///
    /// The allow-list is read fresh on every call. Unknown identities are
    /// denied without touching the store.
    pub async fn authorize(
        &self,
        session: &mut dyn StoreSession,
        door_id: &str,
        identity: ResolvedIdentity,
        kind: CredentialKind,
    ) -> AuthResult<Authorization> {
        if !identity.is_known() {
            return Ok(Authorization::denied(unknown_reason(kind)));
        }

        let allowed_user_ids = session.door_allow_list(door_id).await?;
        let door = Door::new(door_id, allowed_user_ids);
        let authorization = self.evaluate(&door, identity, kind);

        tracing::debug!(
            door_id = %door_id,
            user_id = ?identity.user_id(),
            decision = %authorization.decision,
            "Authorization evaluated"
        );

        Ok(authorization)
    }
}

fn unknown_reason(kind: CredentialKind) -> DecisionReason {
    match kind {
        CredentialKind::Rfid => DecisionReason::RfidNotFound,
        CredentialKind::Pin => DecisionReason::PinNoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_store::{CredentialStore, MemoryCredentialStore};

    #[test]
    fn test_evaluate() {
        let engine = AuthorizationEngine::new();
        let door = Door::new("3", vec![10, 22]);

        assert_eq!(
            engine.evaluate(&door, ResolvedIdentity::User(22), CredentialKind::Rfid),
            Authorization::granted()
        );
        assert_eq!(
            engine.evaluate(&door, ResolvedIdentity::User(7), CredentialKind::Pin),
            Authorization::denied(DecisionReason::NoAccessToDoor)
        );
        assert_eq!(
            engine.evaluate(&door, ResolvedIdentity::Unknown, CredentialKind::Rfid),
            Authorization::denied(DecisionReason::RfidNotFound)
        );
        assert_eq!(
            engine.evaluate(&door, ResolvedIdentity::Unknown, CredentialKind::Pin),
            Authorization::denied(DecisionReason::PinNoMatch)
        );
    }

    #[tokio::test]
    async fn test_authorize_reads_allow_list_fresh() {
        let store = MemoryCredentialStore::new();
        store.put_door("3", vec![10]).await;
        let engine = AuthorizationEngine::new();
        let mut session = store.checkout().await.unwrap();

        let before = engine
            .authorize(session.as_mut(), "3", ResolvedIdentity::User(22), CredentialKind::Pin)
            .await
            .unwrap();
        assert_eq!(before.decision, Decision::Denied);

        store.put_door("3", vec![10, 22]).await;
        let after = engine
            .authorize(session.as_mut(), "3", ResolvedIdentity::User(22), CredentialKind::Pin)
            .await
            .unwrap();
        assert_eq!(after.decision, Decision::Granted);
    }

    #[tokio::test]
    async fn test_unknown_door_denies() {
        let store = MemoryCredentialStore::new();
        let engine = AuthorizationEngine::new();
        let mut session = store.checkout().await.unwrap();

        let result = engine
            .authorize(session.as_mut(), "missing", ResolvedIdentity::User(22), CredentialKind::Rfid)
            .await
            .unwrap();
        assert_eq!(result, Authorization::denied(DecisionReason::NoAccessToDoor));
    }
}
