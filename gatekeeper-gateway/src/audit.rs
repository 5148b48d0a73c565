//! Audit logger.
//!
//! Writes exactly one [`AccessEvent`] per decided event. RFID uids are
//! stored as presented; PIN codes are stored as a freshly salted hash,
//! never in the clear.

use crate::error::GatewayResult;
use gatekeeper_auth::{hash_blocking, Authorization, HashVerifier};
use gatekeeper_model::{AccessEvent, Credential, ResolvedIdentity};
use gatekeeper_store::StoreSession;
use std::sync::Arc;
use tracing::debug;

/// Persists access events.
#[derive(Clone)]
pub struct AuditLogger {
    verifier: Arc<dyn HashVerifier>,
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger").finish_non_exhaustive()
    }
}

impl AuditLogger {
    /// Create a logger hashing PIN payloads with `verifier`.
    pub fn new(verifier: Arc<dyn HashVerifier>) -> Self {
        Self { verifier }
    }

    /// Audit form of a presented credential.
    pub async fn audit_payload(&self, credential: &Credential) -> GatewayResult<String> {
        match credential {
            Credential::Rfid { uid } => Ok(uid.clone()),
            Credential::Pin { code } => Ok(hash_blocking(self.verifier.clone(), code.clone()).await?),
        }
    }

    /// Build and insert the event for one decision.
    ///
    /// # Arguments
    ///
    /// * `session` - Session the decision was made on
    /// * `door_id` - Door the credential was presented at
    /// * `identity` - Resolution outcome; unknown is stored as a null user
    /// * `credential` - Presented credential
    /// * `authorization` - Decision and denial reason
    pub async fn record(
        &self,
        session: &mut dyn StoreSession,
        door_id: &str,
        identity: ResolvedIdentity,
        credential: &Credential,
        authorization: Authorization,
    ) -> GatewayResult<AccessEvent> {
        let payload = self.audit_payload(credential).await?;
        let event = AccessEvent::new(door_id, identity, credential.kind(), payload, authorization.decision)
            .with_reason(authorization.reason);

        session.insert_access_event(&event).await?;

        debug!(
            event_id = %event.id,
            door_id = %event.door_id,
            decision = %event.decision,
            "Access event recorded"
        );

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use gatekeeper_auth::AuthResult;
    use gatekeeper_model::{CredentialKind, Decision, DecisionReason};
    use gatekeeper_store::{CredentialStore, MemoryCredentialStore};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Produces a distinct tag per call so repeated hashes of one code differ.
    #[derive(Default)]
    struct SaltedTagVerifier {
        salt: AtomicU64,
    }

    impl HashVerifier for SaltedTagVerifier {
        fn verify(&self, plaintext: &str, hash: &str) -> bool {
            hash.ends_with(&format!("${}", plaintext.len()))
        }

        fn hash(&self, plaintext: &str) -> AuthResult<String> {
            let salt = self.salt.fetch_add(1, Ordering::SeqCst);
            Ok(format!("tag${}${}", salt, plaintext.len()))
        }
    }

    fn logger() -> AuditLogger {
        AuditLogger::new(Arc::new(SaltedTagVerifier::default()))
    }

    #[tokio::test]
    async fn test_rfid_payload_is_raw_uid() {
        let payload = logger().audit_payload(&Credential::rfid("AB12")).await.unwrap();
        assert_eq!(payload, "AB12");
    }

    #[tokio::test]
    async fn test_pin_payload_is_fresh_hash() {
        let logger = logger();
        let first = logger.audit_payload(&Credential::pin("4321")).await.unwrap();
        let second = logger.audit_payload(&Credential::pin("4321")).await.unwrap();

        assert_ne!(first, "4321");
        assert!(!first.contains("4321"));
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_record_unknown_identity() {
        let store = MemoryCredentialStore::new();
        let mut session = store.checkout().await.unwrap();

        let event = logger()
            .record(
                session.as_mut(),
                "3",
                ResolvedIdentity::Unknown,
                &Credential::rfid("ZZ99"),
                Authorization::denied(DecisionReason::RfidNotFound),
            )
            .await
            .unwrap();

        assert_eq!(event.user_id, None);
        assert_eq!(event.credential_kind, CredentialKind::Rfid);
        assert_eq!(event.decision, Decision::Denied);
        assert_eq!(event.reason, Some(DecisionReason::RfidNotFound));
        assert_eq!(store.events().await, vec![event]);
    }

    #[tokio::test]
    async fn test_record_surfaces_insert_failure() {
        let store = MemoryCredentialStore::new();
        store.set_reject_inserts(true);
        let mut session = store.checkout().await.unwrap();

        let result = logger()
            .record(
                session.as_mut(),
                "3",
                ResolvedIdentity::User(22),
                &Credential::rfid("AB12"),
                Authorization::granted(),
            )
            .await;

        assert!(matches!(result, Err(GatewayError::Store(_))));
        assert!(store.events().await.is_empty());
    }
}
