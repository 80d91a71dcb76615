//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias using the agent error type.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Model backend error.
    #[error("LLM error: {0}")]
    Llm(#[from] napier_llm::LlmError),

    /// Session or protocol error from the tool server side.
    #[error("MCP error: {0}")]
    Mcp(#[from] napier_mcp::McpError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] napier_config::ConfigError),

    /// A `/connect` target that is neither Python nor JavaScript.
    #[error("Server script must be a .py or .js file")]
    UnsupportedScript(String),

    /// Session error.
    #[error("Session error: {0}")]
    Session(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Create a session error.
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
