//! # Credentials
//!
//! A credential is whatever was presented at a door reader. It carries no
//! identity until the resolver maps it onto a persisted credential record.

use crate::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of credential presented at a reader.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum CredentialKind {
    /// RFID card or fob.
    Rfid,
    /// Keypad PIN code.
    Pin,
}

impl CredentialKind {
    /// Get the string representation stored in the audit trail.
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Rfid => "RFID",
            CredentialKind::Pin => "PIN",
        }
    }

    /// Parse from the stored string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "RFID" => Some(CredentialKind::Rfid),
            "PIN" => Some(CredentialKind::Pin),
            _ => None,
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A presented credential.
///
/// `Debug` never prints a PIN code.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// RFID card uid as read from the card.
    Rfid {
        /// Card uid.
        uid: String,
    },
    /// PIN code typed on the keypad.
    Pin {
        /// Plaintext code. Never persisted or logged.
        code: String,
    },
}

impl Credential {
    /// Create an RFID credential.
    pub fn rfid(uid: impl Into<String>) -> Self {
        Credential::Rfid { uid: uid.into() }
    }

    /// Create a PIN credential.
    pub fn pin(code: impl Into<String>) -> Self {
        Credential::Pin { code: code.into() }
    }

    /// Get the credential kind.
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::Rfid { .. } => CredentialKind::Rfid,
            Credential::Pin { .. } => CredentialKind::Pin,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Rfid { uid } => f.debug_struct("Rfid").field("uid", uid).finish(),
            Credential::Pin { .. } => f.debug_struct("Pin").field("code", &"<redacted>").finish(),
        }
    }
}

/// Persisted credential owned by a user.
///
/// For RFID records `secret` is the card uid, for PIN records it is the
/// salted PIN hash. Only active records take part in resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Credential kind.
    pub kind: CredentialKind,
    /// Card uid or PIN hash.
    pub secret: String,
    /// Owning user.
    pub user_id: UserId,
    /// Whether the credential is enabled.
    pub active: bool,
}

impl CredentialRecord {
    /// Create an active RFID record.
    pub fn rfid(uid: impl Into<String>, user_id: UserId) -> Self {
        Self {
            kind: CredentialKind::Rfid,
            secret: uid.into(),
            user_id,
            active: true,
        }
    }

    /// Create an active PIN record from an already computed hash.
    pub fn pin(hash: impl Into<String>, user_id: UserId) -> Self {
        Self {
            kind: CredentialKind::Pin,
            secret: hash.into(),
            user_id,
            active: true,
        }
    }

    /// Mark the record as inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}
