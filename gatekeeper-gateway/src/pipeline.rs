//! Per-event access pipeline.
//!
//! Resolve, authorize, audit, publish, in that order, on one checked-out
//! store session. Store failures never grant access: the event is denied
//! with `store_unavailable` and the audit write is skipped.

use crate::audit::AuditLogger;
use crate::error::GatewayResult;
use crate::inbound::InboundEvent;
use crate::publisher::DecisionPublisher;
use gatekeeper_auth::{Authorization, AuthorizationEngine, CredentialResolver, HashVerifier};
use gatekeeper_model::{Credential, CredentialKind, DecisionReason, ResolvedIdentity};
use gatekeeper_store::{CredentialStore, StoreSession};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happened to the audit write for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    /// Event row inserted
    Written,
    /// Insert attempted and failed
    Failed,
    /// Not attempted because the store failed before a decision was reached
    Skipped,
}

/// Outcome of processing one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEvent {
    /// Door the event was for
    pub door_id: String,
    /// Kind of credential presented
    pub credential_kind: CredentialKind,
    /// Resolution outcome
    pub identity: ResolvedIdentity,
    /// Decision and denial reason
    pub authorization: Authorization,
    /// Audit write result
    pub audit: AuditStatus,
    /// Whether the decision reached the bus
    pub published: bool,
}

impl ProcessedEvent {
    /// Whether a store failure forced the decision.
    pub fn store_failed(&self) -> bool {
        self.authorization.reason == Some(DecisionReason::StoreUnavailable)
    }
}

/// Drives one event through resolution, authorization, audit and publish.
#[derive(Clone)]
pub struct AccessPipeline {
    store: Arc<dyn CredentialStore>,
    resolver: CredentialResolver,
    engine: AuthorizationEngine,
    audit: AuditLogger,
    publisher: DecisionPublisher,
}

impl std::fmt::Debug for AccessPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPipeline")
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}

impl AccessPipeline {
    /// Assemble a pipeline. The verifier serves both PIN resolution and
    /// audit hashing.
    pub fn new(store: Arc<dyn CredentialStore>, verifier: Arc<dyn HashVerifier>, publisher: DecisionPublisher) -> Self {
        Self {
            store,
            resolver: CredentialResolver::new(verifier.clone()),
            engine: AuthorizationEngine::new(),
            audit: AuditLogger::new(verifier),
            publisher,
        }
    }

    /// Process one parsed event.
    ///
    /// # Errors
    ///
    /// Only `InvalidCredential`, before any store access or publish. Every
    /// later failure is logged and reflected in the returned outcome.
    pub async fn process(&self, event: &InboundEvent) -> GatewayResult<ProcessedEvent> {
        let credential = event.credential()?;
        let door_id = event.door_id.as_str();

        let (identity, authorization, audit) = match self.store.checkout().await {
            Ok(mut session) => {
                let (identity, authorization) = self.decide(session.as_mut(), &credential, door_id).await;
                let audit = if authorization.reason == Some(DecisionReason::StoreUnavailable) {
                    AuditStatus::Skipped
                } else {
                    self.record(session.as_mut(), door_id, identity, &credential, authorization)
                        .await
                };
                (identity, authorization, audit)
            }
            Err(e) => {
                error!(door_id = %door_id, error = %e, "Failed to check out store session");
                (
                    ResolvedIdentity::Unknown,
                    Authorization::denied(DecisionReason::StoreUnavailable),
                    AuditStatus::Skipped,
                )
            }
        };

        let published = match self
            .publisher
            .publish(door_id, authorization.decision, event.addressing)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                error!(door_id = %door_id, decision = %authorization.decision, error = %e, "Failed to publish decision");
                false
            }
        };

        info!(
            door_id = %door_id,
            credential_kind = %credential.kind(),
            user_id = ?identity.user_id(),
            decision = %authorization.decision,
            reason = ?authorization.reason.map(|r| r.as_str()),
            "Access event processed"
        );

        Ok(ProcessedEvent {
            door_id: door_id.to_string(),
            credential_kind: credential.kind(),
            identity,
            authorization,
            audit,
            published,
        })
    }

    async fn decide(
        &self,
        session: &mut dyn StoreSession,
        credential: &Credential,
        door_id: &str,
    ) -> (ResolvedIdentity, Authorization) {
        let identity = match self.resolver.resolve(session, credential, door_id).await {
            Ok(identity) => identity,
            Err(e) => {
                error!(door_id = %door_id, code = e.error_code(), error = %e, "Credential resolution failed");
                return (
                    ResolvedIdentity::Unknown,
                    Authorization::denied(DecisionReason::StoreUnavailable),
                );
            }
        };

        match self.engine.authorize(session, door_id, identity, credential.kind()).await {
            Ok(authorization) => (identity, authorization),
            Err(e) => {
                error!(door_id = %door_id, code = e.error_code(), error = %e, "Door allow-list lookup failed");
                (identity, Authorization::denied(DecisionReason::StoreUnavailable))
            }
        }
    }

    async fn record(
        &self,
        session: &mut dyn StoreSession,
        door_id: &str,
        identity: ResolvedIdentity,
        credential: &Credential,
        authorization: Authorization,
    ) -> AuditStatus {
        match self
            .audit
            .record(session, door_id, identity, credential, authorization)
            .await
        {
            Ok(_) => AuditStatus::Written,
            Err(e) => {
                warn!(door_id = %door_id, error = %e, "Audit write failed, publishing decision anyway");
                AuditStatus::Failed
            }
        }
    }
}
