//! Realtime WebSocket handler
//!
//! Each connection is bridged to one realtime session keyed by the path's
//! session id. Microphone frames pass the audio gate before reaching the
//! session; session events are relayed back as JSON text frames.

use axum::{
    Extension,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::bridge::OutboundFrame;
use crate::middleware::ClientIp;
use crate::state::AppState;

use super::messages::ClientMessage;

/// Channel buffer size for outbound frames
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// Realtime WebSocket handler
///
/// Upgrades `GET /ws/{session_id}` to the bridge protocol.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let client_ip = client_ip.map(|Extension(ClientIp(ip))| ip);
    info!(session_id = %session_id, ip = ?client_ip, "Realtime WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, session_id, state, client_ip))
}

async fn handle_socket(
    socket: WebSocket,
    session_id: String,
    state: Arc<AppState>,
    client_ip: Option<IpAddr>,
) {
    let (mut sender, mut receiver) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<OutboundFrame>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames
    let sender_task = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let result = match frame {
                OutboundFrame::Event(value) => {
                    sender.send(Message::Text(value.to_string().into())).await
                }
                OutboundFrame::Close => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let entry_id = match state.bridge.connect(&session_id, frame_tx.clone()).await {
        Ok(id) => id,
        Err(e) => {
            error!(session_id = %session_id, "Realtime session setup failed: {}", e);
            if frame_tx.send(OutboundFrame::Close).await.is_ok() {
                let _ = sender_task.await;
            } else {
                sender_task.abort();
            }
            if let Some(ip) = client_ip {
                state.release_connection(ip);
            }
            return;
        }
    };

    info!(session_id = %session_id, "Realtime WebSocket connection established");

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_text(&state, &session_id, entry_id, text.as_str()).await
            }
            Ok(Message::Binary(_)) => {
                debug!(session_id = %session_id, "Ignoring binary frame");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Realtime WebSocket closed by client");
                break;
            }
            // Ping/Pong are answered by axum
            Ok(_) => {}
            Err(e) => {
                warn!(session_id = %session_id, "Realtime WebSocket error: {}", e);
                break;
            }
        }
    }

    // Cleanup
    state.bridge.disconnect(&session_id, entry_id).await;
    sender_task.abort();

    if let Some(ip) = client_ip {
        state.release_connection(ip);
    }
}

async fn handle_text(state: &AppState, session_id: &str, entry_id: u64, text: &str) {
    let data = match ClientMessage::parse(text) {
        Ok(ClientMessage::Audio { data }) => data,
        Ok(ClientMessage::Other) => return,
        Err(e) => {
            warn!(session_id = %session_id, "Ignoring malformed client message: {}", e);
            return;
        }
    };

    let Some(audio) = state.audio_gate.gate(&data) else {
        debug!(session_id = %session_id, samples = data.len(), "Dropped silent audio frame");
        return;
    };

    match state.bridge.send_audio(session_id, entry_id, audio).await {
        Ok(true) => {}
        Ok(false) => debug!(session_id = %session_id, entry_id, "Session gone or superseded, audio dropped"),
        Err(e) => warn!(session_id = %session_id, "Failed to forward audio: {}", e),
    }
}
