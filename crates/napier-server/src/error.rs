//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use napier_agent::AgentError;
use napier_config::ConfigError;
use napier_mcp::McpError;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Agent error.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// Machine-readable code, used in HTTP bodies and WebSocket `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "bad_request",
            ServerError::NotFound(_) => "not_found",
            ServerError::Internal(_) => "internal_error",
            ServerError::Serialization(_) => "serialization_error",
            ServerError::Agent(e) => match e {
                AgentError::Mcp(McpError::NotConnected) => "not_connected",
                AgentError::Mcp(McpError::UnknownTool(_)) => "unknown_tool",
                AgentError::Mcp(McpError::ConnectInProgress) => "connect_in_progress",
                AgentError::Mcp(McpError::Cancelled) => "connect_cancelled",
                AgentError::Mcp(_) => "connect_failed",
                AgentError::Config(ConfigError::ServerNotFound(_)) => "server_not_found",
                AgentError::Config(ConfigError::MissingSecret { .. }) => "missing_secret",
                AgentError::Config(_) => "config_error",
                AgentError::UnsupportedScript(_) => "invalid_script",
                AgentError::Session(_) => "session_error",
                AgentError::Llm(_) => "llm_error",
                AgentError::Internal(_) => "internal_error",
            },
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Agent(AgentError::Config(ConfigError::ServerNotFound(_))) => {
                StatusCode::NOT_FOUND
            }
            ServerError::Agent(AgentError::UnsupportedScript(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
