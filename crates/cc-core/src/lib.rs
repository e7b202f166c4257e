//! # cc-core
//!
//! Core domain models, wire protocol and ports for clipcast.
//!
//! This crate contains pure business logic without any infrastructure dependencies.
//! Sockets, clipboards and the async runtime live in `cc-platform` and `cc-app`.

pub mod cache;
pub mod config;
pub mod error;
pub mod ids;
pub mod ports;
pub mod protocol;

// Re-export commonly used types at the crate root
pub use cache::ClientCache;
pub use config::AppConfig;
pub use error::{ConnError, DecodeError, ServiceError};
pub use ids::SessionId;
pub use protocol::{Request, Response, CHECK_REQUEST, HEARTBEAT_SENTINEL};
