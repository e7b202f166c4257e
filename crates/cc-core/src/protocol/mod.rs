//! Broadcast protocol (v1).
//!
//! Both endpoints exchange flat UTF-8 text frames. The framing itself
//! (4-byte big-endian length prefix) lives in `cc-platform`; this module owns
//! the message vocabulary and the rule that decides whether a response carries
//! new data.
//!
//! ```text
//! subscriber                     publisher
//!     │ ── "check" ─────────────────▶ │
//!     │ ◀──────────── "¤" | <value> ─ │
//! ```

use crate::error::DecodeError;

/// Reserved heartbeat token meaning "no change since the last tick".
///
/// A shared value equal to this token is never published as data.
pub const HEARTBEAT_SENTINEL: &str = "¤";

/// Literal request token sent by subscribers ("poll me").
pub const CHECK_REQUEST: &str = "check";

/// Default upper bound for a single frame body (8 MiB).
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Wire contract version. There is no negotiation; both sides speak v1.
pub const PROTOCOL_VERSION: u8 = 1;

/// Subscriber → publisher message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Check,
}

impl Request {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Request::Check => CHECK_REQUEST,
        }
    }

    /// Parse a decoded frame. Anything other than the check token is not a request.
    pub fn parse(text: &str) -> Option<Self> {
        (text == CHECK_REQUEST).then_some(Request::Check)
    }
}

/// Publisher → subscriber message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Heartbeat,
    Value(String),
}

impl Response {
    /// Classify a decoded frame. The sentinel always wins over data.
    pub fn from_text(text: String) -> Self {
        if text == HEARTBEAT_SENTINEL {
            Response::Heartbeat
        } else {
            Response::Value(text)
        }
    }

    /// Build the response for a value about to be published.
    ///
    /// Returns `None` when the value collides with the sentinel, which would
    /// make it indistinguishable from a heartbeat.
    pub fn for_value(value: &str) -> Option<Self> {
        if value == HEARTBEAT_SENTINEL {
            None
        } else {
            Some(Response::Value(value.to_string()))
        }
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Response::Heartbeat => HEARTBEAT_SENTINEL,
            Response::Value(value) => value,
        }
    }
}

/// Decode a frame body into text.
///
/// Empty bodies and invalid UTF-8 are not protocol messages. Callers are
/// expected to swallow these errors and treat them as "no update".
pub fn decode_text(body: Vec<u8>) -> Result<String, DecodeError> {
    if body.is_empty() {
        return Err(DecodeError::Empty);
    }
    String::from_utf8(body).map_err(|_| DecodeError::InvalidUtf8)
}

/// Whether a response carries data the subscriber has not seen yet.
///
/// All three must hold: the response is present, it is not the heartbeat
/// sentinel, and it differs from the cached value.
pub fn is_actionable(response: Option<&str>, cached: &str) -> bool {
    match response {
        Some(text) => text != HEARTBEAT_SENTINEL && text != cached,
        None => false,
    }
}
