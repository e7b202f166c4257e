//! Error taxonomy shared by server and client.

use crate::ids::SessionId;
use thiserror::Error;

/// Transport-level failure on a single connection.
///
/// Resets, broken pipes, clean EOF and write timeouts all collapse into
/// `Disconnected`; there is no retry below the owning loop.
#[derive(Debug, Error)]
pub enum ConnError {
    #[error("peer disconnected: {0}")]
    Disconnected(String),
}

impl ConnError {
    pub fn disconnected(reason: impl Into<String>) -> Self {
        Self::Disconnected(reason.into())
    }
}

impl From<std::io::Error> for ConnError {
    fn from(err: std::io::Error) -> Self {
        Self::Disconnected(err.to_string())
    }
}

/// A frame that is not a protocol message. Always swallowed by the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("frame exceeds max: {len} > {max}")]
    Oversize { len: usize, max: usize },
}

/// Service-level failures surfaced to the operator.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Address in use or not valid. Fatal to server startup.
    #[error("{addr} - address is already in use or the IP is not valid: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Cannot reach the publisher. Fatal to client startup.
    #[error("cannot connect to server {addr}; it may not exist or has reached its connection limit: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Missing or invalid settings. Fatal to startup.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Capacity exceeded. Recoverable; the peer is simply refused.
    #[error("connection attempt from {0} rejected: connection limit reached")]
    ConnectionRejected(SessionId),

    /// Lost the publisher mid-session. Fatal on the client.
    #[error("lost connection to server: {0}")]
    PeerDisconnected(String),
}

impl From<ConnError> for ServiceError {
    fn from(err: ConnError) -> Self {
        match err {
            ConnError::Disconnected(reason) => ServiceError::PeerDisconnected(reason),
        }
    }
}
