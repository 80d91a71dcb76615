//! WebSocket protocol types for client-server communication.

use serde::{Deserialize, Serialize};

use napier_agent::{RelayEvent, ServerSummary};
use napier_mcp::{Session, ToolDescriptor};

/// Messages from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Chat input. A leading `/` makes it a directive.
    Chat {
        /// The message content.
        message: String,
    },
    /// Connect to a configured server, or the default one.
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server: Option<String>,
    },
    /// Drop the current session.
    Disconnect,
    /// List the current session's tools.
    ListTools,
    /// List configured servers.
    ListServers,
    /// Ping to keep connection alive.
    Ping,
}

/// Messages from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One event of a running turn.
    Turn {
        event: RelayEvent,
    },
    /// A session was established.
    Connected {
        server: String,
        /// Transport tier that won negotiation.
        transport: String,
        tools: Vec<ToolDescriptor>,
    },
    /// The session was dropped.
    Disconnected,
    /// Tool catalog of the current session.
    Tools {
        tools: Vec<ToolDescriptor>,
    },
    /// Configured servers.
    Servers {
        servers: Vec<ServerSummary>,
    },
    /// Informational text, such as help or usage hints.
    Notice {
        message: String,
    },
    /// Error occurred.
    Error {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },
    /// Pong response to ping.
    Pong,
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
        }
    }

    pub fn connected(session: Session) -> Self {
        Self::Connected {
            server: session.server,
            transport: session.transport.to_string(),
            tools: session.tools,
        }
    }
}

impl From<crate::ServerError> for ServerMessage {
    fn from(err: crate::ServerError) -> Self {
        Self::error(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_client_messages() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "chat", "message": "/tools"})).unwrap();
        assert!(matches!(msg, ClientMessage::Chat { message } if message == "/tools"));

        let msg: ClientMessage = serde_json::from_value(json!({"type": "connect"})).unwrap();
        assert!(matches!(msg, ClientMessage::Connect { server: None }));

        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "connect", "server": "weather"})).unwrap();
        assert!(matches!(msg, ClientMessage::Connect { server: Some(s) } if s == "weather"));

        let msg: ClientMessage = serde_json::from_value(json!({"type": "list_tools"})).unwrap();
        assert!(matches!(msg, ClientMessage::ListTools));

        assert!(serde_json::from_value::<ClientMessage>(json!({"type": "launch"})).is_err());
    }

    #[test]
    fn test_serialize_server_messages() {
        let value = serde_json::to_value(ServerMessage::error("turn_in_progress", "busy")).unwrap();
        assert_eq!(
            value,
            json!({"type": "error", "code": "turn_in_progress", "message": "busy"})
        );

        let value = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(value, json!({"type": "pong"}));

        let servers = ServerMessage::Servers {
            servers: vec![ServerSummary {
                name: "weather".into(),
                endpoint: "python weather.py".into(),
            }],
        };
        let value = serde_json::to_value(servers).unwrap();
        assert_eq!(value["servers"][0]["name"], "weather");
    }

    #[test]
    fn test_turn_wraps_relay_event() {
        let (relay, mut rx) = napier_agent::TurnRelay::start("hi");
        relay.succeed();

        let ack = rx.try_recv().unwrap();
        let value = serde_json::to_value(ServerMessage::Turn { event: ack }).unwrap();
        assert_eq!(value["type"], "turn");
        assert_eq!(value["event"]["kind"], "ack");
        assert_eq!(value["event"]["query"], "hi");
    }
}
