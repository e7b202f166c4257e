//! Mock implementations of ports for testing.
//!
//! This module provides mock implementations using `mockall` so use cases can
//! be tested without sockets or a real clipboard.

use crate::ids::SessionId;
use crate::ports::{
    AdmissionNotifierPort, ClipboardReaderPort, ClipboardWriterPort, DataViewPort,
    SubscriberNotifierPort,
};
use mockall::mock;

mock! {
    pub ClipboardReader {}

    impl ClipboardReaderPort for ClipboardReader {
        fn read_current_value(&self) -> anyhow::Result<String>;
    }
}

mock! {
    pub ClipboardWriter {}

    impl ClipboardWriterPort for ClipboardWriter {
        fn write_text(&self, text: &str) -> anyhow::Result<()>;
    }
}

mock! {
    pub SubscriberNotifier {}

    impl SubscriberNotifierPort for SubscriberNotifier {
        fn on_data_received(&self, text: &str);
        fn on_heartbeat_connection_lost(&self);
    }
}

mock! {
    pub AdmissionNotifier {}

    impl AdmissionNotifierPort for AdmissionNotifier {
        fn on_connection_accepted(&self, id: &SessionId);
        fn on_connection_rejected(&self, id: &SessionId);
        fn on_connection_lost(&self, id: &SessionId);
    }
}

mock! {
    pub DataView {}

    impl DataViewPort for DataView {
        fn show(&self, text: &str);
    }
}
