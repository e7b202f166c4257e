use crate::error::ConnError;
use crate::ids::SessionId;
use async_trait::async_trait;

/// Subscriber end of one publisher connection.
#[async_trait]
pub trait PollTransportPort: Send {
    fn session_id(&self) -> SessionId;

    /// Send the check request.
    async fn send_request(&mut self) -> Result<(), ConnError>;

    /// Wait for the next response frame.
    ///
    /// `Ok(None)` means a frame arrived that is not a protocol message.
    async fn receive(&mut self) -> Result<Option<String>, ConnError>;

    async fn close(&mut self);
}
