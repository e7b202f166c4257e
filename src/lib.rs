//! # clipcast
//!
//! One publisher shares its clipboard text with many subscribers over TCP.
//!
//! ## Modules
//!
//! - **bootstrap**: config loading, tracing setup, adapter wiring and the
//!   publisher/subscriber entry points
//! - **cli**: command-line surface and its config overrides

pub mod bootstrap;
pub mod cli;

pub use cli::{Cli, Commands};
