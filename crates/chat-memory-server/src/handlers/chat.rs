use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tracing::info;

use crate::services::conversation::{ChatEngine, GenerationSession};
use crate::transport::WsTransport;

/// `GET /ws/chat`: one generation session per socket.
pub async fn chat_ws_handler(ws: WebSocketUpgrade, State(engine): State<Arc<ChatEngine>>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, engine))
}

async fn run_session(socket: WebSocket, engine: Arc<ChatEngine>) {
    let mut session = GenerationSession::new(engine, WsTransport::new(socket));
    let final_state = session.run().await;
    info!("Chat socket finished in state {}", final_state);
}
