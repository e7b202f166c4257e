use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

/// Peer session identifier.
///
/// Assigned by the transport: it is the remote socket address of an accepted
/// connection (or the local address on the subscriber side). Operators know a
/// peer by its ephemeral port, so `Display` renders `ID(<port>)`.
///
/// 会话标识：由传输层分配（对端临时端口）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(SocketAddr);

impl SessionId {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.0
    }

    pub fn port(&self) -> u16 {
        self.0.port()
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ID({})", self.0.port())
    }
}

impl From<SocketAddr> for SessionId {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}
