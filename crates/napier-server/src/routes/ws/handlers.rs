//! WebSocket message handlers.

use std::sync::Arc;

use napier_agent::{
    AgentError, Directive, DirectiveOutcome, HELP_TEXT, TurnRelay, execute, parse_input,
};

use super::connection::ConnectionState;
use super::protocol::{ClientMessage, ServerMessage};
use crate::error::ServerError;
use crate::state::AppState;

/// Whether the read loop keeps going after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Handle a client message.
///
/// Turns and connects run in spawned tasks so `disconnect` can still be read
/// while they are in flight.
pub async fn handle_message(msg: ClientMessage, conn: &ConnectionState, app: &AppState) -> Flow {
    match msg {
        ClientMessage::Ping => conn.send(ServerMessage::Pong),

        ClientMessage::Chat { message } => return handle_chat(message, conn, app).await,

        ClientMessage::Connect { server } => {
            match app.servers().descriptor_or_default(server.as_deref()) {
                Ok(descriptor) => spawn_connect(conn, Directive::ConnectServer {
                    name: descriptor.name,
                }, app),
                Err(e) => conn.send(agent_error(e)),
            }
        }

        ClientMessage::Disconnect => {
            conn.sessions.disconnect().await;
            conn.send(ServerMessage::Disconnected);
        }

        ClientMessage::ListTools => match conn.sessions.list_tools().await {
            Ok(tools) => conn.send(ServerMessage::Tools { tools }),
            Err(e) => conn.send(agent_error(e.into())),
        },

        ClientMessage::ListServers => conn.send(ServerMessage::Servers {
            servers: app.servers().summaries(),
        }),
    }
    Flow::Continue
}

/// Route chat input to a directive or a turn.
async fn handle_chat(message: String, conn: &ConnectionState, app: &AppState) -> Flow {
    let parsed = parse_input(&message);
    let Some(directive) = Directive::from_input(&parsed) else {
        start_turn(message, conn, app);
        return Flow::Continue;
    };

    match directive {
        Directive::Connect { .. } | Directive::ConnectServer { .. } => {
            spawn_connect(conn, directive, app);
            Flow::Continue
        }
        Directive::Exit => Flow::Close,
        directive => {
            match execute(directive, &conn.sessions, app.servers()).await {
                Ok(DirectiveOutcome::Query(query)) => start_turn(query, conn, app),
                Ok(outcome) => conn.send(outcome_message(outcome)),
                Err(e) => conn.send(agent_error(e)),
            }
            Flow::Continue
        }
    }
}

/// Start a turn unless one is already running on this connection.
fn start_turn(query: String, conn: &ConnectionState, app: &AppState) {
    let Ok(mut conversation) = conn.conversation.clone().try_lock_owned() else {
        conn.send(ServerMessage::error(
            "turn_in_progress",
            "A turn is already running on this connection",
        ));
        return;
    };

    let orchestrator = Arc::clone(app.orchestrator());
    let sessions = Arc::clone(&conn.sessions);
    let outbound = conn.outbound();
    let cancel = conn.cancellation.clone();
    let connection_id = conn.id;

    tokio::spawn(async move {
        let (relay, mut events) = TurnRelay::start(query.clone());

        let turn = orchestrator.run_turn(&mut conversation, sessions.as_ref(), &query, relay);
        let forward = async {
            while let Some(event) = events.recv().await {
                let _ = outbound.send(ServerMessage::Turn { event });
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(connection_id = %connection_id, "Turn abandoned, connection closed");
            }
            _ = async { tokio::join!(turn, forward) } => {}
        }
        // An abandoned turn's relay has queued its terminal error by now
        while let Ok(event) = events.try_recv() {
            let _ = outbound.send(ServerMessage::Turn { event });
        }
        // The conversation lock is released here, after every event was queued.
    });
}

/// Run a connect directive off the read loop.
fn spawn_connect(conn: &ConnectionState, directive: Directive, app: &AppState) {
    let sessions = Arc::clone(&conn.sessions);
    let outbound = conn.outbound();
    let cancel = conn.cancellation.clone();
    let app = app.clone();

    tokio::spawn(async move {
        let result = tokio::select! {
            _ = cancel.cancelled() => return,
            result = execute(directive, &sessions, app.servers()) => result,
        };
        let msg = match result {
            Ok(outcome) => outcome_message(outcome),
            Err(e) => agent_error(e),
        };
        let _ = outbound.send(msg);
    });
}

fn outcome_message(outcome: DirectiveOutcome) -> ServerMessage {
    match outcome {
        DirectiveOutcome::Connected(session) => ServerMessage::connected(session),
        DirectiveOutcome::Disconnected => ServerMessage::Disconnected,
        DirectiveOutcome::Servers(servers) => ServerMessage::Servers { servers },
        DirectiveOutcome::Tools(tools) => ServerMessage::Tools { tools },
        DirectiveOutcome::Help => ServerMessage::notice(HELP_TEXT),
        DirectiveOutcome::Notice(message) => ServerMessage::notice(message),
        // Exit and Query are handled before execution results get here.
        DirectiveOutcome::Exit => ServerMessage::notice("Goodbye"),
        DirectiveOutcome::Query(query) => ServerMessage::notice(query),
    }
}

fn agent_error(err: AgentError) -> ServerMessage {
    tracing::debug!(error = %err, "Directive failed");
    ServerError::from(err).into()
}
