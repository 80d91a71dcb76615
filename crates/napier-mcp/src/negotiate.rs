//! Transport tier negotiation.
//!
//! A server endpoint is tried against a fixed list of transport tiers, most
//! capable first. Every attempt builds its own transport and runs the full
//! handshake under a timeout; the first tier to finish wins.

use std::fmt;
use std::time::Duration;

use crate::client::{Endpoint, McpClient, ServerDescriptor};
use crate::error::{McpError, Result};
use crate::protocol::InitializeResult;
use crate::transport::{HttpTransportConfig, McpTransport, StdioFraming};

/// Default bound on a single tier's handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// A transport tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// POST with JSON or SSE responses and `Mcp-Session-Id`.
    StreamableHttp,
    /// Plain JSON request/response POST.
    HttpPost,
    /// Newline-delimited JSON over stdio.
    StdioLines,
    /// `Content-Length` framed JSON over stdio.
    StdioFramed,
}

impl TransportKind {
    /// Stable identifier used in logs and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreamableHttp => "streamable-http",
            Self::HttpPost => "http-post",
            Self::StdioLines => "stdio-lines",
            Self::StdioFramed => "stdio-framed",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tiers to try for an endpoint, in preference order.
pub fn tiers_for(endpoint: &Endpoint) -> &'static [TransportKind] {
    match endpoint {
        Endpoint::Command { .. } => &[TransportKind::StdioLines, TransportKind::StdioFramed],
        Endpoint::Url(_) => &[TransportKind::StreamableHttp, TransportKind::HttpPost],
    }
}

/// Why one tier failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierFailure {
    pub kind: TransportKind,
    pub reason: String,
}

impl TierFailure {
    pub fn new(kind: TransportKind, error: &McpError) -> Self {
        Self {
            kind,
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for TierFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.reason)
    }
}

/// A client that completed its handshake.
pub struct Negotiated {
    pub client: McpClient,
    pub kind: TransportKind,
    pub init: InitializeResult,
}

impl fmt::Debug for Negotiated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Negotiated")
            .field("server", &self.client.name())
            .field("kind", &self.kind)
            .field("init", &self.init)
            .finish()
    }
}

/// Runs tier negotiation for a server descriptor.
#[derive(Debug, Clone)]
pub struct Negotiator {
    handshake_timeout: Duration,
}

impl Default for Negotiator {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-tier handshake timeout.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Try each tier for the descriptor's endpoint until one handshakes.
    ///
    /// Fails with [`McpError::NegotiationFailed`] listing every attempt.
    pub async fn negotiate(&self, descriptor: &ServerDescriptor) -> Result<Negotiated> {
        let mut attempts = Vec::new();

        for &kind in tiers_for(&descriptor.endpoint) {
            tracing::debug!(server = %descriptor.name, tier = %kind, "attempting transport");

            match self.attempt_handshake(kind, descriptor).await {
                Ok((client, init)) => {
                    tracing::info!(
                        server = %descriptor.name,
                        tier = %kind,
                        remote = %init.server_info.name,
                        "transport negotiated"
                    );
                    return Ok(Negotiated { client, kind, init });
                }
                Err(e) => {
                    tracing::debug!(server = %descriptor.name, tier = %kind, error = %e, "transport failed");
                    attempts.push(TierFailure::new(kind, &e));
                }
            }
        }

        tracing::warn!(server = %descriptor.name, attempts = attempts.len(), "all transports failed");
        Err(McpError::NegotiationFailed { attempts })
    }

    async fn attempt_handshake(
        &self,
        kind: TransportKind,
        descriptor: &ServerDescriptor,
    ) -> Result<(McpClient, InitializeResult)> {
        let transport = open_transport(kind, descriptor)?;
        let client = McpClient::new(&descriptor.name, transport);

        let outcome = match tokio::time::timeout(self.handshake_timeout, client.initialize()).await
        {
            Ok(result) => result,
            Err(_) => Err(McpError::Timeout),
        };

        match outcome {
            Ok(init) => Ok((client, init)),
            Err(e) => {
                let _ = client.shutdown().await;
                Err(e)
            }
        }
    }
}

fn open_transport(kind: TransportKind, descriptor: &ServerDescriptor) -> Result<McpTransport> {
    match (&descriptor.endpoint, kind) {
        (Endpoint::Command { command, args }, TransportKind::StdioLines) => {
            McpTransport::spawn_stdio(command, args, &descriptor.env, StdioFraming::Lines)
        }
        (Endpoint::Command { command, args }, TransportKind::StdioFramed) => {
            McpTransport::spawn_stdio(command, args, &descriptor.env, StdioFraming::ContentLength)
        }
        (Endpoint::Url(url), TransportKind::StreamableHttp | TransportKind::HttpPost) => {
            let config = descriptor
                .headers
                .iter()
                .fold(HttpTransportConfig::new(url), |config, (k, v)| {
                    config.with_header(k, v)
                });
            McpTransport::connect_http(config, kind == TransportKind::StreamableHttp)
        }
        (_, kind) => Err(McpError::transport(format!(
            "{} does not apply to this endpoint",
            kind
        ))),
    }
}
