//! clipcast application layer
//!
//! The two long-lived drivers of the protocol: the publisher's tick loop and
//! the subscriber's poll loop. Both depend on ports only; wiring to sockets
//! and clipboards happens in the binary's bootstrap.

pub mod usecases;

pub use usecases::{PollLoop, PollStep, PublishLoop, TickOutcome};
