//! Gateway configuration.
//!
//! Loaded from environment variables with defaults suitable for a local
//! broker. Only the database URL is required.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Gateway configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Message bus connection URL.
    pub bus_url: String,

    /// Namespace prepended to every bus channel.
    pub bus_prefix: String,

    /// Credential store connection URL.
    pub database_url: String,

    /// Maximum pooled store connections.
    pub db_max_connections: u32,

    /// Topic carrying card taps.
    pub card_topic: String,

    /// Topic carrying PIN entries.
    pub pin_topic: String,

    /// Base of the per-door reader topics `<base>/<door_id>/<card|pin topic>`.
    /// Empty disables them.
    pub door_topic_base: String,

    /// Prefix of the per-door topic receiving `granted`.
    pub granted_topic_prefix: String,

    /// Prefix of the per-door topic receiving `denied`.
    pub denied_topic_prefix: String,

    /// Capacity of the inbound event queue.
    pub queue_capacity: usize,

    /// Create missing tables at startup.
    pub init_schema: bool,

    /// Listen address of the admin API, `None` when disabled.
    pub admin_addr: Option<SocketAddr>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bus_url", &self.bus_url)
            .field("bus_prefix", &self.bus_prefix)
            .field("database_url", &"<redacted>")
            .field("db_max_connections", &self.db_max_connections)
            .field("card_topic", &self.card_topic)
            .field("pin_topic", &self.pin_topic)
            .field("door_topic_base", &self.door_topic_base)
            .field("granted_topic_prefix", &self.granted_topic_prefix)
            .field("denied_topic_prefix", &self.denied_topic_prefix)
            .field("queue_capacity", &self.queue_capacity)
            .field("init_schema", &self.init_schema)
            .field("admin_addr", &self.admin_addr)
            .finish()
    }
}

impl Default for GatewayConfig {
    /// Returns default configuration suitable for local development.
    fn default() -> Self {
        Self {
            bus_url: "redis://127.0.0.1:6379".to_string(),
            bus_prefix: "gatekeeper".to_string(),
            database_url: String::new(),
            db_max_connections: 5,
            card_topic: "card_input".to_string(),
            pin_topic: "code_input".to_string(),
            door_topic_base: "doors".to_string(),
            granted_topic_prefix: "access_granted/".to_string(),
            denied_topic_prefix: "access_denied/".to_string(),
            queue_capacity: 64,
            init_schema: false,
            admin_addr: Some(SocketAddr::from(([127, 0, 0, 1], 8080))),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `GATEKEEPER_BUS_URL`: Bus URL (default: redis://127.0.0.1:6379)
    /// - `GATEKEEPER_BUS_PREFIX`: Channel namespace (default: gatekeeper)
    /// - `GATEKEEPER_DATABASE_URL`: Store URL (required)
    /// - `GATEKEEPER_DB_MAX_CONNECTIONS`: Pool size (default: 5)
    /// - `GATEKEEPER_CARD_TOPIC`: Card tap topic (default: card_input)
    /// - `GATEKEEPER_PIN_TOPIC`: PIN entry topic (default: code_input)
    /// - `GATEKEEPER_DOOR_TOPIC_BASE`: Per-door topic base, empty disables (default: doors)
    /// - `GATEKEEPER_GRANTED_TOPIC_PREFIX`: Granted topic prefix (default: access_granted/)
    /// - `GATEKEEPER_DENIED_TOPIC_PREFIX`: Denied topic prefix (default: access_denied/)
    /// - `GATEKEEPER_QUEUE_CAPACITY`: Inbound queue capacity (default: 64)
    /// - `GATEKEEPER_INIT_SCHEMA`: Create missing tables (default: false)
    /// - `GATEKEEPER_ADMIN_ADDR`: Admin API address, `off` disables (default: 127.0.0.1:8080)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let database_url = lookup("GATEKEEPER_DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("GATEKEEPER_DATABASE_URL".to_string()))?;

        Ok(Self {
            bus_url: lookup("GATEKEEPER_BUS_URL").unwrap_or(default.bus_url),
            bus_prefix: lookup("GATEKEEPER_BUS_PREFIX").unwrap_or(default.bus_prefix),
            database_url,
            db_max_connections: parse_or(&lookup, "GATEKEEPER_DB_MAX_CONNECTIONS", default.db_max_connections)?,
            card_topic: lookup("GATEKEEPER_CARD_TOPIC").unwrap_or(default.card_topic),
            pin_topic: lookup("GATEKEEPER_PIN_TOPIC").unwrap_or(default.pin_topic),
            door_topic_base: lookup("GATEKEEPER_DOOR_TOPIC_BASE")
                .map(|s| s.trim().to_string())
                .unwrap_or(default.door_topic_base),
            granted_topic_prefix: lookup("GATEKEEPER_GRANTED_TOPIC_PREFIX").unwrap_or(default.granted_topic_prefix),
            denied_topic_prefix: lookup("GATEKEEPER_DENIED_TOPIC_PREFIX").unwrap_or(default.denied_topic_prefix),
            queue_capacity: parse_or(&lookup, "GATEKEEPER_QUEUE_CAPACITY", default.queue_capacity)?,
            init_schema: lookup("GATEKEEPER_INIT_SCHEMA")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(default.init_schema),
            admin_addr: match lookup("GATEKEEPER_ADMIN_ADDR") {
                None => default.admin_addr,
                Some(raw) if raw.trim().is_empty() || raw.trim() == "off" => None,
                Some(raw) => Some(
                    raw.trim()
                        .parse()
                        .map_err(|e: std::net::AddrParseError| invalid("GATEKEEPER_ADMIN_ADDR", &e.to_string()))?,
                ),
            },
        })
    }

    /// Validate the configuration before connecting anything.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("GATEKEEPER_DATABASE_URL".to_string()));
        }
        if self.card_topic == self.pin_topic {
            return Err(invalid("GATEKEEPER_PIN_TOPIC", "must differ from the card topic"));
        }
        for (key, topic) in [
            ("GATEKEEPER_CARD_TOPIC", &self.card_topic),
            ("GATEKEEPER_PIN_TOPIC", &self.pin_topic),
            ("GATEKEEPER_DOOR_TOPIC_BASE", &self.door_topic_base),
        ] {
            if topic.contains(['+', '#']) {
                return Err(invalid(key, "must not contain wildcards"));
            }
        }
        if self.door_topic_base.ends_with('/') {
            return Err(invalid("GATEKEEPER_DOOR_TOPIC_BASE", "must not end with '/'"));
        }
        if self.granted_topic_prefix == self.denied_topic_prefix {
            return Err(invalid(
                "GATEKEEPER_DENIED_TOPIC_PREFIX",
                "must differ from the granted topic prefix",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("GATEKEEPER_QUEUE_CAPACITY", "must be greater than zero"));
        }
        if self.db_max_connections == 0 {
            return Err(invalid("GATEKEEPER_DB_MAX_CONNECTIONS", "must be greater than zero"));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| invalid(key, &e.to_string())),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
