//! TCP plumbing: the publisher's listener and the subscriber's dialer.

mod client;
mod server;

pub use client::connect;
pub use server::PublisherListener;
