//! WebSocket endpoint.
//!
//! Each socket is one client context: its own tool session, its own
//! conversation, and at most one running turn.

mod connection;
mod handlers;
mod protocol;

pub use connection::ConnectionId;
pub use protocol::{ClientMessage, ServerMessage};

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::Response;

use crate::state::AppState;

/// Upgrade a request to a WebSocket connection.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(state.config().max_ws_message_size)
        .on_upgrade(move |socket| connection::handle_socket(socket, state))
}
