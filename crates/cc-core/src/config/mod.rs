//! Configuration DTO
//! 配置数据传输对象
//!
//! `AppConfig::from_toml` maps whatever is in the file onto typed fields and
//! fills defaults for missing keys. It performs no validation; invalid values
//! are facts until `AppConfig::validate` looks at them at startup.

use crate::error::ServiceError;
use crate::protocol::MAX_FRAME_BYTES;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Port the publisher listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 5567;

/// Bind address keyword meaning "the first local IPv4 address of this host".
pub const AUTO_ADDRESS: &str = "auto";

/// Publisher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, or `"auto"`.
    pub address: String,
    pub port: u16,
    pub tick_interval_ms: u64,
    /// A send blocked for longer than this evicts the peer.
    pub send_timeout_ms: u64,
    /// Echo every newly published value to the operator.
    pub show_data: bool,
    pub max_connections: usize,
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_address: String,
    pub server_port: u16,
    /// `true`: write each update to the system clipboard.
    /// `false`: show it and copy on operator acknowledgement.
    pub auto_copy: bool,
    /// Silence shorter than this is a heartbeat.
    pub receive_timeout_ms: u64,
    /// Silence longer than this is a lost publisher.
    pub dead_peer_after_ms: u64,
    pub max_frame_bytes: usize,
}

/// Which notifications reach the operator. Logging happens regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningsConfig {
    /// Surface connection attempts rejected by admission control.
    pub connection_attempt: bool,
    /// Surface peers dropping (server) or the server dropping (client).
    pub peer_disconnection: bool,
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub warnings: WarningsConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                address: AUTO_ADDRESS.to_string(),
                port: DEFAULT_PORT,
                tick_interval_ms: 100,
                send_timeout_ms: 2_000,
                show_data: false,
                max_connections: 30,
            },
            client: ClientConfig {
                server_address: "127.0.0.1".to_string(),
                server_port: DEFAULT_PORT,
                auto_copy: true,
                receive_timeout_ms: 1_000,
                dead_peer_after_ms: 10_000,
                max_frame_bytes: MAX_FRAME_BYTES,
            },
            warnings: WarningsConfig {
                connection_attempt: true,
                peer_disconnection: true,
            },
        }
    }
}

fn lookup<'a>(value: &'a toml::Value, section: &str, key: &str) -> Option<&'a toml::Value> {
    value.get(section).and_then(|s| s.get(key))
}

fn wrong_type(section: &str, key: &str, expected: &str) -> ServiceError {
    ServiceError::Configuration(format!("{section}.{key} must be {expected}"))
}

/// `Ok(None)` when the key is absent; an error when it holds another type.
fn get_str<'a>(
    value: &'a toml::Value,
    section: &str,
    key: &str,
) -> Result<Option<&'a str>, ServiceError> {
    lookup(value, section, key)
        .map(|v| v.as_str().ok_or_else(|| wrong_type(section, key, "a string")))
        .transpose()
}

fn get_int(value: &toml::Value, section: &str, key: &str) -> Result<Option<i64>, ServiceError> {
    lookup(value, section, key)
        .map(|v| v.as_integer().ok_or_else(|| wrong_type(section, key, "an integer")))
        .transpose()
}

fn get_bool(value: &toml::Value, section: &str, key: &str) -> Result<Option<bool>, ServiceError> {
    lookup(value, section, key)
        .map(|v| v.as_bool().ok_or_else(|| wrong_type(section, key, "true or false")))
        .transpose()
}

impl AppConfig {
    /// Map a parsed TOML document onto the DTO.
    ///
    /// Missing keys take defaults. A key holding the wrong type is a
    /// [`ServiceError::Configuration`]. Negative numbers clamp to zero so that
    /// `validate` can report them.
    pub fn from_toml(toml_value: &toml::Value) -> anyhow::Result<Self> {
        let d = Self::default();
        let uint = |section: &str, key: &str, default: u64| -> Result<u64, ServiceError> {
            Ok(get_int(toml_value, section, key)?
                .map(|v| v.max(0) as u64)
                .unwrap_or(default))
        };
        let port = |section: &str, key: &str, default: u16| -> Result<u16, ServiceError> {
            Ok(get_int(toml_value, section, key)?
                .map(|v| u16::try_from(v).unwrap_or(0))
                .unwrap_or(default))
        };
        let string = |section: &str, key: &str, default: &str| -> Result<String, ServiceError> {
            Ok(get_str(toml_value, section, key)?
                .unwrap_or(default)
                .to_string())
        };
        let flag = |section: &str, key: &str, default: bool| -> Result<bool, ServiceError> {
            Ok(get_bool(toml_value, section, key)?.unwrap_or(default))
        };

        Ok(Self {
            server: ServerConfig {
                address: string("server", "address", &d.server.address)?,
                port: port("server", "port", d.server.port)?,
                tick_interval_ms: uint("server", "tick_interval_ms", d.server.tick_interval_ms)?,
                send_timeout_ms: uint("server", "send_timeout_ms", d.server.send_timeout_ms)?,
                show_data: flag("server", "show_data", d.server.show_data)?,
                max_connections: uint(
                    "connections",
                    "max_connections",
                    d.server.max_connections as u64,
                )? as usize,
            },
            client: ClientConfig {
                server_address: string("client", "server_address", &d.client.server_address)?,
                server_port: port("client", "server_port", d.client.server_port)?,
                auto_copy: flag("client", "auto_copy", d.client.auto_copy)?,
                receive_timeout_ms: uint(
                    "client",
                    "receive_timeout_ms",
                    d.client.receive_timeout_ms,
                )?,
                dead_peer_after_ms: uint(
                    "client",
                    "dead_peer_after_ms",
                    d.client.dead_peer_after_ms,
                )?,
                max_frame_bytes: uint(
                    "client",
                    "max_frame_bytes",
                    d.client.max_frame_bytes as u64,
                )? as usize,
            },
            warnings: WarningsConfig {
                connection_attempt: flag(
                    "show_warnings",
                    "connection_attempt",
                    d.warnings.connection_attempt,
                )?,
                peer_disconnection: flag(
                    "show_warnings",
                    "peer_disconnection",
                    d.warnings.peer_disconnection,
                )?,
            },
        })
    }

    /// Reject settings the loops cannot run with.
    pub fn validate(&self) -> Result<(), ServiceError> {
        let invalid = |msg: &str| Err(ServiceError::Configuration(msg.to_string()));

        if self.server.address.trim().is_empty() {
            return invalid("server.address must not be empty");
        }
        if self.server.port == 0 {
            return invalid("server.port must be between 1 and 65535");
        }
        if self.server.max_connections == 0 {
            return invalid("connections.max_connections must be at least 1");
        }
        if self.server.tick_interval_ms == 0 {
            return invalid("server.tick_interval_ms must be positive");
        }
        if self.server.send_timeout_ms == 0 {
            return invalid("server.send_timeout_ms must be positive");
        }
        if self.client.server_address.trim().is_empty() {
            return invalid("client.server_address must not be empty");
        }
        if self.client.server_port == 0 {
            return invalid("client.server_port must be between 1 and 65535");
        }
        if self.client.receive_timeout_ms == 0 {
            return invalid("client.receive_timeout_ms must be positive");
        }
        if self.client.dead_peer_after_ms < self.client.receive_timeout_ms {
            return invalid("client.dead_peer_after_ms must not be shorter than receive_timeout_ms");
        }
        if self.client.max_frame_bytes == 0 {
            return invalid("client.max_frame_bytes must be positive");
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl ClientConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn dead_peer_after(&self) -> Duration {
        Duration::from_millis(self.dead_peer_after_ms)
    }

    pub fn server_endpoint(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }
}
