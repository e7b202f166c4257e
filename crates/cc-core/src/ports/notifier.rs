//! Fire-and-forget notifications towards the operator.
//! 面向操作者的通知（无返回值）。

use crate::ids::SessionId;

/// Presentation collaborator on the subscriber.
pub trait SubscriberNotifierPort: Send + Sync {
    /// Called at most once per actionable update.
    fn on_data_received(&self, text: &str);

    /// Called once, right before the subscriber terminates.
    fn on_heartbeat_connection_lost(&self);
}

/// Admission events on the publisher.
pub trait AdmissionNotifierPort: Send + Sync {
    fn on_connection_accepted(&self, id: &SessionId);

    /// Capacity exceeded; the peer's socket is already closed.
    fn on_connection_rejected(&self, id: &SessionId);

    /// Fires exactly once per evicted peer.
    fn on_connection_lost(&self, id: &SessionId);
}

/// Optional publisher-side view of the value just published.
pub trait DataViewPort: Send + Sync {
    fn show(&self, text: &str);
}
