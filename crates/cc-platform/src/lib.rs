//! # cc-platform
//!
//! Platform-specific implementations for clipcast.
//!
//! This crate contains the adapters that touch the operating system: TCP
//! sockets, the framed connection and its registry, and the system clipboard.

pub mod adapters;
pub mod clipboard;
pub mod net_utils;
pub mod transport;
