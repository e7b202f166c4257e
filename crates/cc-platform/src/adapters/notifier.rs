//! Operator-facing notifiers and presenters.
//!
//! These stand in for the desktop dialogs: they print to the terminal and
//! touch the system clipboard. Which warnings surface is controlled by
//! `[show_warnings]`; the registry and loops log regardless.

use cc_core::cache::ClientCache;
use cc_core::config::WarningsConfig;
use cc_core::ids::SessionId;
use cc_core::ports::{
    AdmissionNotifierPort, ClipboardWriterPort, DataViewPort, SubscriberNotifierPort,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Log target for messages meant for the operator rather than for debugging.
pub const OPERATOR_TARGET: &str = "clipcast::operator";

/// Publisher-side admission warnings.
pub struct OperatorAdmissionNotifier {
    warnings: WarningsConfig,
}

impl OperatorAdmissionNotifier {
    pub fn new(warnings: WarningsConfig) -> Self {
        Self { warnings }
    }
}

impl AdmissionNotifierPort for OperatorAdmissionNotifier {
    fn on_connection_accepted(&self, id: &SessionId) {
        info!(target: OPERATOR_TARGET, peer = %id, "{id} connected");
    }

    fn on_connection_rejected(&self, id: &SessionId) {
        if self.warnings.connection_attempt {
            warn!(
                target: OPERATOR_TARGET,
                peer = %id,
                "connection attempt exceeding the maximum number of connections, {id}"
            );
        }
    }

    fn on_connection_lost(&self, id: &SessionId) {
        if self.warnings.peer_disconnection {
            warn!(target: OPERATOR_TARGET, peer = %id, "{id} closed the connection");
        }
    }
}

fn report_server_lost(warn_on_disconnect: bool) {
    if warn_on_disconnect {
        warn!(target: OPERATOR_TARGET, "cannot reach the server");
    }
}

/// Writes every update to the system clipboard.
///
/// Inside a tokio runtime the write runs on the blocking pool so a slow
/// clipboard never stalls the poll loop. A write that starts after a newer
/// one has landed is skipped.
pub struct AutoCopyPresenter {
    clipboard: Arc<dyn ClipboardWriterPort>,
    warn_on_disconnect: bool,
    issued: AtomicU64,
    written: Arc<Mutex<u64>>,
}

impl AutoCopyPresenter {
    pub fn new(clipboard: Arc<dyn ClipboardWriterPort>, warn_on_disconnect: bool) -> Self {
        Self {
            clipboard,
            warn_on_disconnect,
            issued: AtomicU64::new(0),
            written: Arc::new(Mutex::new(0)),
        }
    }

    fn copy(&self, text: &str) -> Option<JoinHandle<()>> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let clipboard = self.clipboard.clone();
        let written = self.written.clone();
        let text = text.to_owned();

        let write = move || {
            let mut last = written.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if *last > seq {
                debug!(seq, "skipping superseded clipboard write");
                return;
            }
            match clipboard.write_text(&text) {
                Ok(()) => debug!(len = text.len(), "copied update to clipboard"),
                Err(e) => warn!(error = %e, "failed to write update to clipboard"),
            }
            *last = seq;
        };

        match Handle::try_current() {
            Ok(handle) => Some(handle.spawn_blocking(write)),
            Err(_) => {
                write();
                None
            }
        }
    }
}

impl SubscriberNotifierPort for AutoCopyPresenter {
    fn on_data_received(&self, text: &str) {
        let _ = self.copy(text);
    }

    fn on_heartbeat_connection_lost(&self) {
        report_server_lost(self.warn_on_disconnect);
    }
}

/// Shows each update and copies the cached value when the operator confirms.
#[derive(Clone)]
pub struct ShowAndConfirmPresenter {
    clipboard: Arc<dyn ClipboardWriterPort>,
    cache: ClientCache,
    warn_on_disconnect: bool,
}

impl ShowAndConfirmPresenter {
    pub fn new(
        clipboard: Arc<dyn ClipboardWriterPort>,
        cache: ClientCache,
        warn_on_disconnect: bool,
    ) -> Self {
        Self {
            clipboard,
            cache,
            warn_on_disconnect,
        }
    }

    /// Copy whatever the cache currently holds.
    pub async fn acknowledge(&self) {
        let value = self.cache.current();
        let clipboard = self.clipboard.clone();
        match tokio::task::spawn_blocking(move || clipboard.write_text(&value)).await {
            Ok(Ok(())) => info!(target: OPERATOR_TARGET, "copied to clipboard"),
            Ok(Err(e)) => warn!(error = %e, "failed to write to clipboard"),
            Err(e) => warn!(error = %e, "clipboard write task failed"),
        }
    }

    /// Treat every line read from `input` as an acknowledgement.
    ///
    /// Returns when the input ends or `cancel` fires.
    pub async fn listen_for_acknowledgements<R>(&self, input: R, cancel: CancellationToken)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(input).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(_)) => self.acknowledge().await,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "acknowledgement input failed");
                        break;
                    }
                },
            }
        }
    }
}

impl SubscriberNotifierPort for ShowAndConfirmPresenter {
    fn on_data_received(&self, text: &str) {
        println!("──── new data (press Enter to copy) ────");
        println!("{text}");
    }

    fn on_heartbeat_connection_lost(&self) {
        report_server_lost(self.warn_on_disconnect);
    }
}

/// Publisher-side echo of each newly published value.
#[derive(Default)]
pub struct ConsoleDataView;

impl DataViewPort for ConsoleDataView {
    fn show(&self, text: &str) {
        println!("──── published ────");
        println!("{text}");
    }
}
