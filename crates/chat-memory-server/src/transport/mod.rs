//! Bidirectional message channel between one client and its session.

pub mod ws;

use thiserror::Error;

pub use ws::WsTransport;

/// Sent after the last fragment of every reply.
pub const END_MARKER: &str = "[END]";

pub const CLOSE_NORMAL: u16 = 1000;
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;
pub const CLOSE_AUTH_FAILED: u16 = 4000;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("peer disconnected")]
    Disconnected,

    #[error("protocol error: {0}")]
    Protocol(String),
}

#[async_trait::async_trait]
pub trait ChatTransport: Send {
    /// Next text frame from the client; `None` once the peer is gone.
    async fn receive_next_turn(&mut self) -> Result<Option<String>, TransportError>;

    async fn send_fragment(&mut self, text: &str) -> Result<(), TransportError>;

    async fn send_end_marker(&mut self) -> Result<(), TransportError> {
        self.send_fragment(END_MARKER).await
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError>;
}
