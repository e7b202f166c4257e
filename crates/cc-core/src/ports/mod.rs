//! Port interfaces for the application layer
//!
//! Ports define the contract between the use cases in `cc-app` and the
//! adapters in `cc-platform`: the clipboard on either end, operator
//! notifications, and the two halves of the wire (broadcast fan-out on the
//! publisher, request/response on the subscriber).

mod broadcast;
mod clipboard;
mod notifier;
mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod mocks;

pub use broadcast::BroadcastPort;
pub use clipboard::{ClipboardReaderPort, ClipboardWriterPort};
pub use notifier::{AdmissionNotifierPort, DataViewPort, SubscriberNotifierPort};
pub use transport::PollTransportPort;
