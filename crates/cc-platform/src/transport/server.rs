use cc_core::error::ServiceError;
use cc_core::ids::SessionId;
use cc_core::ports::AdmissionNotifierPort;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::adapters::{Connection, ConnectionRegistry};

/// Bound publisher socket feeding the connection registry.
pub struct PublisherListener {
    listener: TcpListener,
    send_timeout: Duration,
}

impl PublisherListener {
    /// Bind the listening socket. Failure here is fatal to startup.
    pub async fn bind(addr: SocketAddr, send_timeout: Duration) -> Result<Self, ServiceError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServiceError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            listener,
            send_timeout,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServiceError> {
        self.listener
            .local_addr()
            .map_err(|source| ServiceError::Bind {
                addr: "listener".to_string(),
                source,
            })
    }

    /// Accept peers until `cancel` fires, applying admission control.
    pub async fn run_accept_loop(
        self,
        registry: ConnectionRegistry,
        notifier: Arc<dyn AdmissionNotifierPort>,
        cancel: CancellationToken,
    ) {
        info!(max = registry.max_connections(), "accepting subscribers");
        loop {
            let accepted = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, peer_addr) = match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    // Per-connection accept errors (e.g. ECONNABORTED) are not fatal.
                    error!(error = %e, "accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            };

            let id = SessionId::new(peer_addr);
            let conn = Connection::from_tcp(id, stream).with_send_timeout(self.send_timeout);
            if registry.try_accept(conn).await {
                notifier.on_connection_accepted(&id);
            } else {
                warn!(error = %ServiceError::ConnectionRejected(id), "admission refused");
                notifier.on_connection_rejected(&id);
            }
        }
        info!("accept loop stopped");
    }
}
