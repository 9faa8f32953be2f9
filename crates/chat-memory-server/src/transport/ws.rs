use axum::extract::ws::{CloseFrame, Message, WebSocket};
use tracing::debug;

use super::{ChatTransport, TransportError};

pub struct WsTransport {
    socket: WebSocket,
    closed: bool,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self {
            socket,
            closed: false,
        }
    }
}

#[async_trait::async_trait]
impl ChatTransport for WsTransport {
    async fn receive_next_turn(&mut self) -> Result<Option<String>, TransportError> {
        if self.closed {
            return Ok(None);
        }

        loop {
            match self.socket.recv().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.to_string())),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Peer closed socket: {:?}", frame.map(|f| f.code));
                    self.closed = true;
                    return Ok(None);
                }
                // ping is answered by the socket itself
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Binary(data))) => {
                    debug!("Ignoring {} byte binary frame", data.len());
                }
                Some(Err(e)) => {
                    debug!("Socket receive error: {}", e);
                    self.closed = true;
                    return Ok(None);
                }
                None => {
                    self.closed = true;
                    return Ok(None);
                }
            }
        }
    }

    async fn send_fragment(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Disconnected);
        }

        self.socket
            .send(Message::Text(text.to_string().into()))
            .await
            .map_err(|e| {
                debug!("Socket send error: {}", e);
                self.closed = true;
                TransportError::Disconnected
            })
    }

    async fn close(&mut self, code: u16) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.socket
            .send(Message::Close(Some(CloseFrame {
                code,
                reason: "".into(),
            })))
            .await
            .map_err(|e| TransportError::Protocol(e.to_string()))
    }
}
