//! Credential resolution.
//!
//! Maps a presented credential onto the user who owns it:
//! - RFID: indexed lookup of an active card by uid, owned by an active user
//! - PIN: linear scan over every active PIN hash of an active user, first
//!   verifying hash wins
//!
//! PIN codes are stored salted, so there is nothing to index on; the scan
//! stops at the first match and otherwise checks every active record before
//! concluding the code is unknown.

use crate::error::{AuthError, AuthResult};
use crate::hash::HashVerifier;
use gatekeeper_model::{Credential, CredentialKind, CredentialRecord, ResolvedIdentity, UserId};
use gatekeeper_store::StoreSession;
use std::sync::Arc;
use tracing::debug;

/// Longest identifier accepted from a reader.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Resolves presented credentials to user identities.
#[derive(Clone)]
pub struct CredentialResolver {
    verifier: Arc<dyn HashVerifier>,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

impl CredentialResolver {
    /// Create a resolver around a hash verifier.
    pub fn new(verifier: Arc<dyn HashVerifier>) -> Self {
        Self { verifier }
    }

    /// Build a validated credential from a reader identifier.
    ///
    /// # Errors
    ///
    /// `InvalidCredential` for an empty identifier or one longer than
    /// [`MAX_IDENTIFIER_LEN`].
    pub fn credential(kind: CredentialKind, identifier: &str) -> AuthResult<Credential> {
        if identifier.is_empty() {
            return Err(AuthError::InvalidCredential(format!("empty {} identifier", kind)));
        }
        if identifier.len() > MAX_IDENTIFIER_LEN {
            return Err(AuthError::InvalidCredential(format!(
                "{} identifier longer than {} bytes",
                kind, MAX_IDENTIFIER_LEN
            )));
        }
        Ok(match kind {
            CredentialKind::Rfid => Credential::rfid(identifier),
            CredentialKind::Pin => Credential::pin(identifier),
        })
    }

    /// Resolve a credential presented at a door.
    ///
    /// # Arguments
    ///
    /// * `session` - Checked-out store session
    /// * `credential` - Presented credential
    /// * `door_id` - Door the credential was presented at
    ///
    /// # Returns
    ///
    /// The owning user, `Unknown` when nothing active matches, or a store error.
    pub async fn resolve(
        &self,
        session: &mut dyn StoreSession,
        credential: &Credential,
        door_id: &str,
    ) -> AuthResult<ResolvedIdentity> {
        let identity: ResolvedIdentity = match credential {
            Credential::Rfid { uid } => session
                .find_active_rfid(uid)
                .await?
                .filter(|record| record.active)
                .map(|record| record.user_id)
                .into(),
            Credential::Pin { code } => {
                let records = session.list_active_pins().await?;
                self.scan_pins(code.clone(), records).await?.into()
            }
        };

        debug!(
            door_id = %door_id,
            credential_kind = %credential.kind(),
            user_id = ?identity.user_id(),
            "Credential resolved"
        );

        Ok(identity)
    }

    /// Verify on the blocking pool; each verification is deliberately slow.
    async fn scan_pins(&self, code: String, records: Vec<CredentialRecord>) -> AuthResult<Option<UserId>> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || first_verifying(verifier.as_ref(), &code, &records))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))
    }
}

/// Owner of the first active record whose hash verifies against `code`.
///
/// Records after the first match are never passed to the verifier.
pub fn first_verifying(verifier: &dyn HashVerifier, code: &str, records: &[CredentialRecord]) -> Option<UserId> {
    records
        .iter()
        .filter(|record| record.active)
        .find(|record| verifier.verify(code, &record.secret))
        .map(|record| record.user_id)
}
