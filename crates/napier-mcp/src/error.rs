//! Error types for MCP operations.

use thiserror::Error;

use crate::negotiate::TierFailure;

/// Result type for MCP operations.
pub type Result<T> = std::result::Result<T, McpError>;

/// Error type for MCP operations.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to spawn the MCP server process.
    #[error("failed to spawn MCP server: {0}")]
    SpawnFailed(String),

    /// Failed to communicate with the MCP server.
    #[error("transport error: {0}")]
    Transport(String),

    /// JSON-RPC protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server returned an error response.
    #[error("server error {code}: {message}")]
    ServerError {
        /// Error code from the server.
        code: i64,
        /// Error message from the server.
        message: String,
        /// Optional additional data.
        data: Option<serde_json::Value>,
    },

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Timeout waiting for response.
    #[error("timeout waiting for response")]
    Timeout,

    /// Every transport tier failed to complete a handshake.
    #[error("all transports failed: {}", format_attempts(.attempts))]
    NegotiationFailed {
        /// One entry per attempted tier, in attempt order.
        attempts: Vec<TierFailure>,
    },

    /// No session is active.
    #[error("not connected to an MCP server")]
    NotConnected,

    /// The tool is not in the current session's catalog.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Another connect attempt is still running.
    #[error("a connection attempt is already in progress")]
    ConnectInProgress,

    /// The connect attempt was cancelled by a disconnect.
    #[error("connection attempt cancelled")]
    Cancelled,
}

fn format_attempts(attempts: &[TierFailure]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl McpError {
    /// Create a spawn failed error.
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a server error from an error response.
    pub fn server_error(
        code: i64,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
            data,
        }
    }

    /// Returns true if the channel to the server is unusable after this error.
    ///
    /// JSON-RPC error responses and session-state errors leave the channel intact.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Io(_) | Self::ConnectionClosed | Self::Timeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiate::TransportKind;

    #[test]
    fn test_error_display() {
        let err = McpError::spawn_failed("command not found");
        assert!(err.to_string().contains("spawn"));
        assert!(err.to_string().contains("command not found"));

        let err = McpError::server_error(-32600, "Invalid Request", None);
        assert!(err.to_string().contains("-32600"));
        assert!(err.to_string().contains("Invalid Request"));
    }

    #[test]
    fn test_negotiation_failed_names_every_tier() {
        let err = McpError::NegotiationFailed {
            attempts: vec![
                TierFailure::new(TransportKind::StdioLines, &McpError::Timeout),
                TierFailure::new(TransportKind::StdioFramed, &McpError::ConnectionClosed),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("stdio-lines"));
        assert!(msg.contains("timeout"));
        assert!(msg.contains("stdio-framed"));
        assert!(msg.contains("connection closed"));
    }

    #[test]
    fn test_transport_failure_classification() {
        assert!(McpError::ConnectionClosed.is_transport_failure());
        assert!(McpError::transport("broken pipe").is_transport_failure());
        assert!(!McpError::server_error(-32601, "nope", None).is_transport_failure());
        assert!(!McpError::NotConnected.is_transport_failure());
        assert!(!McpError::UnknownTool("x".into()).is_transport_failure());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let mcp_err: McpError = json_err.into();
        assert!(matches!(mcp_err, McpError::Json(_)));
    }
}
