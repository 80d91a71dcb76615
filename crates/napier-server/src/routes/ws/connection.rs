//! WebSocket connection lifecycle and state management.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use napier_agent::Conversation;
use napier_mcp::{SessionManager, SessionState};

use super::handlers::{Flow, handle_message};
use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

/// Unique identifier for a WebSocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Create a new unique connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One client context: its own session, conversation and outbound queue.
pub struct ConnectionState {
    pub id: ConnectionId,
    pub sessions: Arc<SessionManager>,
    /// Held for the whole of a turn.
    pub conversation: Arc<Mutex<Conversation>>,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    /// Cancelled when the connection closes; spawned work races it.
    pub cancellation: CancellationToken,
}

impl ConnectionState {
    fn new(state: &AppState, outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id: ConnectionId::new(),
            sessions: Arc::new(state.new_session_manager()),
            conversation: Arc::new(Mutex::new(Conversation::new())),
            outbound,
            cancellation: CancellationToken::new(),
        }
    }

    /// Queue a frame. Frames are written in queue order.
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.outbound.send(msg);
    }

    /// Whether a turn or a connect is still running for this client.
    pub fn is_busy(&self) -> bool {
        self.conversation.try_lock().is_err() || self.sessions.state() == SessionState::Connecting
    }

    /// A handle spawned tasks can queue frames through.
    pub fn outbound(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.outbound.clone()
    }
}

impl Drop for ConnectionState {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Handle a WebSocket connection.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_frames(sender, rx));

    let conn = ConnectionState::new(&state, tx);
    let idle_timeout = state.config().idle_timeout;

    tracing::debug!(connection_id = %conn.id, "WebSocket connection established");

    loop {
        let msg = match tokio::time::timeout(idle_timeout, receiver.next()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            // Waiting on our own work is not inactivity
            Err(_) if conn.is_busy() => continue,
            Err(_) => {
                tracing::info!(connection_id = %conn.id, "WebSocket connection closed due to idle timeout");
                conn.send(ServerMessage::error(
                    "idle_timeout",
                    "Connection closed due to inactivity",
                ));
                break;
            }
        };

        let text = match msg {
            Ok(Message::Text(text)) => text.to_string(),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    conn.send(ServerMessage::error(
                        "invalid_message",
                        "Binary data must be UTF-8",
                    ));
                    continue;
                }
            },
            // axum answers pings itself
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!(connection_id = %conn.id, error = %e, "WebSocket error");
                break;
            }
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                conn.send(ServerMessage::error(
                    "parse_error",
                    format!("Invalid message: {}", e),
                ));
                continue;
            }
        };

        if let Flow::Close = handle_message(client_msg, &conn, &state).await {
            break;
        }
    }

    conn.cancellation.cancel();
    conn.sessions.disconnect().await;
    tracing::debug!(connection_id = %conn.id, "WebSocket connection closed");

    // The writer drains queued frames and exits once every sender is gone.
    drop(conn);
    let _ = writer.await;
}

async fn write_frames(
    mut sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = rx.recv().await {
        if send_message(&mut sender, msg).await.is_err() {
            break;
        }
    }
    let _ = sender.close().await;
}

/// Send a message over the WebSocket.
pub async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(&msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
