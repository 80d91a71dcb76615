//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and resolution.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse JSON.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Failed to parse TOML.
    #[error("failed to parse TOML config: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A `${NAME}` placeholder could not be resolved.
    #[error("secret '{name}' not found (referenced by {context}). Set it in the environment or in .env")]
    MissingSecret { name: String, context: String },

    /// Referenced server is not configured.
    #[error("server '{0}' not found in configuration")]
    ServerNotFound(String),

    /// Server entry cannot be turned into a connection.
    #[error("server '{name}' is invalid: {reason}")]
    InvalidServer { name: String, reason: String },

    /// Other error.
    #[error("{0}")]
    Other(String),
}
