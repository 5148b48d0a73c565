//! Inbound event parsing.
//!
//! Readers publish either `"<identifier>,<door_id>"` on the shared card or
//! PIN topic, or just `"<identifier>"` on a per-door topic
//! `<base>/<door_id>/<card|pin topic>`. Fields past the ones used are
//! ignored.

use crate::error::{GatewayError, GatewayResult};
use chrono::{DateTime, Utc};
use gatekeeper_auth::{AuthError, CredentialResolver};
use gatekeeper_model::{Credential, CredentialKind};

/// Which reader produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    /// Card tap
    Card,
    /// PIN entry
    Pin,
}

impl InboundKind {
    /// Credential kind carried by events of this kind.
    pub fn credential_kind(&self) -> CredentialKind {
        match self {
            InboundKind::Card => CredentialKind::Rfid,
            InboundKind::Pin => CredentialKind::Pin,
        }
    }
}

/// Where the door id of an event comes from. Decides the reply topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorAddressing {
    /// Door id is the second payload field
    Payload,
    /// Door id is the middle level of a per-door topic
    Topic,
}

/// A classified inbound topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRoute {
    /// Reader kind
    pub kind: InboundKind,
    /// Door id taken from the topic, for per-door topics
    pub door_id: Option<String>,
}

/// Topics the gateway consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundTopics {
    /// Card tap topic
    pub card: String,
    /// PIN entry topic
    pub pin: String,
    /// Base of the per-door topics, if enabled
    pub door_base: Option<String>,
}

impl InboundTopics {
    /// Create a topic pair without per-door topics.
    pub fn new(card: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            card: card.into(),
            pin: pin.into(),
            door_base: None,
        }
    }

    /// Also accept `<base>/<door_id>/<card|pin>`. An empty base leaves them off.
    pub fn with_door_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.door_base = (!base.is_empty()).then_some(base);
        self
    }

    /// Subscription patterns covering every accepted topic.
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns = vec![self.card.clone(), self.pin.clone()];
        if let Some(base) = &self.door_base {
            patterns.push(format!("{}/+/{}", base, self.card));
            patterns.push(format!("{}/+/{}", base, self.pin));
        }
        patterns
    }

    /// Classify a message topic.
    ///
    /// The shared topics match exactly. A per-door topic must carry a
    /// non-empty door level.
    pub fn classify(&self, topic: &str) -> GatewayResult<InboundRoute> {
        if topic == self.card {
            return Ok(InboundRoute {
                kind: InboundKind::Card,
                door_id: None,
            });
        }
        if topic == self.pin {
            return Ok(InboundRoute {
                kind: InboundKind::Pin,
                door_id: None,
            });
        }

        let scoped = self
            .door_base
            .as_deref()
            .and_then(|base| topic.strip_prefix(base))
            .and_then(|rest| rest.strip_prefix('/'))
            .and_then(|rest| rest.split_once('/'))
            .filter(|(door_id, _)| !door_id.is_empty());

        match scoped {
            Some((door_id, leaf)) if leaf == self.card => Ok(InboundRoute {
                kind: InboundKind::Card,
                door_id: Some(door_id.to_string()),
            }),
            Some((door_id, leaf)) if leaf == self.pin => Ok(InboundRoute {
                kind: InboundKind::Pin,
                door_id: Some(door_id.to_string()),
            }),
            _ => Err(GatewayError::UnknownTopic(topic.to_string())),
        }
    }
}

/// A parsed reader event.
#[derive(Clone)]
pub struct InboundEvent {
    /// Reader kind
    pub kind: InboundKind,
    /// Card uid or PIN code as presented
    pub identifier: String,
    /// Door the reader belongs to
    pub door_id: String,
    /// Where the door id came from
    pub addressing: DoorAddressing,
    /// When the gateway received the event
    pub received_at: DateTime<Utc>,
}

impl std::fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let identifier = match self.kind {
            InboundKind::Card => self.identifier.as_str(),
            InboundKind::Pin => "<redacted>",
        };
        f.debug_struct("InboundEvent")
            .field("kind", &self.kind)
            .field("identifier", &identifier)
            .field("door_id", &self.door_id)
            .field("addressing", &self.addressing)
            .field("received_at", &self.received_at)
            .finish()
    }
}

impl InboundEvent {
    /// Parse a payload received on a classified topic.
    pub fn from_route(route: &InboundRoute, payload: &str) -> GatewayResult<Self> {
        match &route.door_id {
            Some(door_id) => Self::parse_for_door(route.kind, door_id, payload),
            None => Self::parse(route.kind, payload),
        }
    }

    /// Parse a payload received on a shared topic of the given kind.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` when fewer than two fields are present or either
    /// field is blank.
    pub fn parse(kind: InboundKind, payload: &str) -> GatewayResult<Self> {
        let mut fields = payload.split(',').map(str::trim);

        let (identifier, door_id) = match (fields.next(), fields.next()) {
            (Some(identifier), Some(door_id)) => (identifier, door_id),
            _ => {
                return Err(GatewayError::MalformedPayload(
                    "expected \"<identifier>,<door_id>\"".to_string(),
                ))
            }
        };

        if identifier.is_empty() {
            return Err(GatewayError::MalformedPayload("empty identifier".to_string()));
        }
        if door_id.is_empty() {
            return Err(GatewayError::MalformedPayload("empty door id".to_string()));
        }

        Ok(Self {
            kind,
            identifier: identifier.to_string(),
            door_id: door_id.to_string(),
            addressing: DoorAddressing::Payload,
            received_at: Utc::now(),
        })
    }

    /// Parse a payload received on a per-door topic. The payload holds the
    /// identifier alone.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` when the identifier is blank.
    pub fn parse_for_door(kind: InboundKind, door_id: &str, payload: &str) -> GatewayResult<Self> {
        let identifier = payload.split(',').next().map(str::trim).unwrap_or_default();
        if identifier.is_empty() {
            return Err(GatewayError::MalformedPayload("empty identifier".to_string()));
        }

        Ok(Self {
            kind,
            identifier: identifier.to_string(),
            door_id: door_id.to_string(),
            addressing: DoorAddressing::Topic,
            received_at: Utc::now(),
        })
    }

    /// Validated credential for this event.
    pub fn credential(&self) -> GatewayResult<Credential> {
        CredentialResolver::credential(self.kind.credential_kind(), &self.identifier).map_err(|e| match e {
            AuthError::InvalidCredential(message) => GatewayError::InvalidCredential(message),
            other => GatewayError::Auth(other),
        })
    }
}
