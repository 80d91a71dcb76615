//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Default max message size for WebSocket (1 MB).
pub const DEFAULT_MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Connections that receive no messages for this long are closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Close a connection after this long without a client message.
    pub idle_timeout: Duration,

    /// Maximum WebSocket message size in bytes.
    pub max_ws_message_size: usize,

    /// Per-tier handshake bound when connecting to tool servers.
    pub handshake_timeout: Duration,

    /// CORS allowed origins (empty = no CORS).
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_ws_message_size: DEFAULT_MAX_WS_MESSAGE_SIZE,
            handshake_timeout: napier_mcp::DEFAULT_HANDSHAKE_TIMEOUT,
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the tool-server handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set CORS allowed origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.to_string(), DEFAULT_BIND_ADDRESS);
        assert_eq!(config.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert!(config.cors_origins.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::new()
            .with_bind_address("0.0.0.0:9000".parse().unwrap())
            .with_idle_timeout(Duration::from_secs(5))
            .with_cors_origins(vec!["http://localhost:3000".into()]);

        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert_eq!(config.cors_origins.len(), 1);
    }
}
