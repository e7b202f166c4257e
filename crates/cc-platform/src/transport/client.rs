use cc_core::error::ServiceError;
use cc_core::ids::SessionId;
use tokio::net::TcpStream;
use tracing::info;

use crate::adapters::Connection;

/// Dial the publisher. The returned connection is identified by its local
/// port, which is what the publisher sees as this subscriber's id.
pub async fn connect(endpoint: &str, max_frame_bytes: usize) -> Result<Connection, ServiceError> {
    let connect_err = |source| ServiceError::Connect {
        addr: endpoint.to_string(),
        source,
    };

    let stream = TcpStream::connect(endpoint).await.map_err(connect_err)?;
    let local = stream.local_addr().map_err(connect_err)?;
    let id = SessionId::new(local);
    info!(server = %endpoint, session = %id, "connected to server");

    Ok(Connection::from_tcp(id, stream).with_max_frame_bytes(max_frame_bytes))
}
