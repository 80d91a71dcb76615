//! Transport layer for MCP communication.
//!
//! Local servers speak JSON-RPC over the child's stdio, either one message per
//! line or with `Content-Length` framing. Remote servers are reached over HTTP
//! POST, optionally with the streamable extensions (SSE responses and the
//! `Mcp-Session-Id` header).

use std::process::Stdio;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::{McpError, Result};
use crate::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Header carrying the server-assigned session on streamable HTTP.
pub const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Largest `Content-Length` body accepted from a stdio server.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Configuration for HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Endpoint URL of the MCP server.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout: Duration::from_secs(30),
            headers: Vec::new(),
        }
    }
}

impl HttpTransportConfig {
    /// Create a new HTTP transport config with the given URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

/// Message framing on a stdio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioFraming {
    /// One JSON message per line.
    Lines,
    /// `Content-Length: N\r\n\r\n` header followed by N bytes of JSON.
    ContentLength,
}

/// Transport for communicating with an MCP server.
pub enum McpTransport {
    /// Stdio transport - communicates with a child process via stdin/stdout.
    Stdio {
        /// The child process. Killed when the transport is dropped.
        child: Child,
        /// Buffered writer to stdin.
        stdin: BufWriter<ChildStdin>,
        /// Buffered reader from stdout.
        stdout: BufReader<ChildStdout>,
        /// Framing used in both directions.
        framing: StdioFraming,
    },
    /// HTTP transport - communicates via HTTP POST requests.
    Http {
        /// HTTP client.
        client: reqwest::Client,
        /// Transport configuration.
        config: HttpTransportConfig,
        /// Session assigned by a streamable server.
        session_id: Option<String>,
        /// Whether SSE responses and session headers are in play.
        streamable: bool,
    },
}

impl McpTransport {
    /// Create a new HTTP transport.
    ///
    /// No request is sent until the first message.
    pub fn connect_http(config: HttpTransportConfig, streamable: bool) -> Result<Self> {
        url::Url::parse(&config.url)
            .map_err(|e| McpError::transport(format!("invalid URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| McpError::transport(format!("failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            url = %config.url,
            streamable,
            timeout_secs = config.timeout.as_secs(),
            "created HTTP transport"
        );

        Ok(Self::Http {
            client,
            config,
            session_id: None,
            streamable,
        })
    }

    /// Spawn a new stdio transport.
    ///
    /// # Arguments
    /// * `command` - The command to spawn (e.g., "python")
    /// * `args` - Arguments to pass to the command
    /// * `env` - Environment variables added to the inherited environment
    /// * `framing` - Message framing the server is expected to speak
    pub fn spawn_stdio(
        command: &str,
        args: &[String],
        env: &[(String, String)],
        framing: StdioFraming,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| McpError::spawn_failed(format!("failed to spawn '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdin"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::spawn_failed("failed to capture stdout"))?;

        Ok(Self::Stdio {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            framing,
        })
    }

    /// Send a JSON-RPC request and wait for the matching response.
    ///
    /// Notifications and requests initiated by the server, and responses
    /// carrying another id, are skipped.
    pub async fn send_request(&mut self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let message = serde_json::to_value(request)?;
        match self {
            Self::Stdio {
                stdin,
                stdout,
                framing,
                ..
            } => {
                write_stdio(stdin, *framing, &message).await?;
                loop {
                    let incoming = read_stdio(stdout, *framing).await?;
                    match JsonRpcResponse::match_id(incoming, request.id) {
                        Some(parsed) => return Ok(parsed?),
                        None => tracing::trace!(id = request.id, "skipping unrelated message"),
                    }
                }
            }
            Self::Http {
                client,
                config,
                session_id,
                streamable,
            } => {
                let resp =
                    post_message(client, config, session_id.as_deref(), *streamable, &message)
                        .await?;

                if *streamable {
                    if let Some(id) = resp
                        .headers()
                        .get(SESSION_HEADER)
                        .and_then(|v| v.to_str().ok())
                    {
                        *session_id = Some(id.to_string());
                    }
                }

                read_http_response(resp, request.id).await
            }
        }
    }

    /// Send a JSON-RPC notification (no response expected).
    pub async fn send_notification(&mut self, notification: &JsonRpcNotification) -> Result<()> {
        let message = serde_json::to_value(notification)?;
        match self {
            Self::Stdio { stdin, framing, .. } => write_stdio(stdin, *framing, &message).await,
            Self::Http {
                client,
                config,
                session_id,
                streamable,
            } => {
                // Servers answer 202 with an empty body; the response carries nothing we need
                if let Err(e) =
                    post_message(client, config, session_id.as_deref(), *streamable, &message)
                        .await
                {
                    tracing::debug!(error = %e, method = %notification.method, "notification not accepted");
                }
                Ok(())
            }
        }
    }

    /// Shut the transport down.
    ///
    /// Kills the child process for stdio. For streamable HTTP the server-side
    /// session is released with a best-effort `DELETE`.
    pub async fn shutdown(&mut self) -> Result<()> {
        match self {
            Self::Stdio { child, .. } => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                Ok(())
            }
            Self::Http {
                client,
                config,
                session_id,
                ..
            } => {
                if let Some(id) = session_id.take() {
                    let _ = client
                        .delete(&config.url)
                        .header(SESSION_HEADER, id)
                        .send()
                        .await;
                }
                Ok(())
            }
        }
    }

    /// Check if the transport is still usable.
    pub fn is_connected(&mut self) -> bool {
        match self {
            Self::Stdio { child, .. } => matches!(child.try_wait(), Ok(None)),
            // Stateless between requests
            Self::Http { .. } => true,
        }
    }

    /// Check if this is an HTTP transport.
    pub fn is_http(&self) -> bool {
        matches!(self, Self::Http { .. })
    }

    /// Check if this is a stdio transport.
    pub fn is_stdio(&self) -> bool {
        matches!(self, Self::Stdio { .. })
    }

    /// Session id assigned by a streamable HTTP server, if any.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Http { session_id, .. } => session_id.as_deref(),
            Self::Stdio { .. } => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stdio framing
// ─────────────────────────────────────────────────────────────────────────────

async fn write_stdio(
    stdin: &mut BufWriter<ChildStdin>,
    framing: StdioFraming,
    message: &Value,
) -> Result<()> {
    let json = serde_json::to_string(message)?;
    match framing {
        StdioFraming::Lines => {
            stdin.write_all(json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }
        StdioFraming::ContentLength => {
            let header = format!("Content-Length: {}\r\n\r\n", json.len());
            stdin.write_all(header.as_bytes()).await?;
            stdin.write_all(json.as_bytes()).await?;
        }
    }
    stdin.flush().await?;

    tracing::trace!(?framing, json = %json, "sent MCP message");
    Ok(())
}

async fn read_stdio(stdout: &mut BufReader<ChildStdout>, framing: StdioFraming) -> Result<Value> {
    match framing {
        StdioFraming::Lines => read_line_message(stdout).await,
        StdioFraming::ContentLength => read_framed_message(stdout).await,
    }
}

async fn read_line_message(stdout: &mut BufReader<ChildStdout>) -> Result<Value> {
    let mut line = String::new();
    loop {
        line.clear();
        if stdout.read_line(&mut line).await? == 0 {
            return Err(McpError::ConnectionClosed);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        tracing::trace!(json = %trimmed, "received MCP message");
        return serde_json::from_str(trimmed)
            .map_err(|e| McpError::protocol(format!("invalid JSON line: {}", e)));
    }
}

async fn read_framed_message(stdout: &mut BufReader<ChildStdout>) -> Result<Value> {
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        if stdout.read_line(&mut line).await? == 0 {
            return Err(McpError::ConnectionClosed);
        }

        let trimmed = line.trim();
        // Empty line ends the header block
        if trimmed.is_empty() {
            if content_length.is_some() {
                break;
            }
            continue;
        }

        if let Some(len_str) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(len_str.trim().parse().map_err(|e| {
                McpError::protocol(format!("invalid Content-Length: {}", e))
            })?);
        } else if trimmed.starts_with('{') || !trimmed.contains(':') {
            return Err(McpError::protocol(format!(
                "expected Content-Length header, got: {}",
                trimmed
            )));
        }
    }

    let content_length =
        content_length.ok_or_else(|| McpError::protocol("missing Content-Length header"))?;
    if content_length > MAX_MESSAGE_SIZE {
        return Err(McpError::protocol(format!(
            "Content-Length {} exceeds limit of {} bytes",
            content_length, MAX_MESSAGE_SIZE
        )));
    }

    let mut body = vec![0u8; content_length];
    stdout.read_exact(&mut body).await?;

    tracing::trace!(content_length, "received MCP message");
    Ok(serde_json::from_slice(&body)?)
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP
// ─────────────────────────────────────────────────────────────────────────────

async fn post_message(
    client: &reqwest::Client,
    config: &HttpTransportConfig,
    session_id: Option<&str>,
    streamable: bool,
    message: &Value,
) -> Result<reqwest::Response> {
    let accept = if streamable {
        "application/json, text/event-stream"
    } else {
        "application/json"
    };

    let mut req = client
        .post(&config.url)
        .header("Content-Type", "application/json")
        .header("Accept", accept)
        .json(message);

    for (key, value) in &config.headers {
        req = req.header(key, value);
    }
    if let Some(id) = session_id {
        req = req.header(SESSION_HEADER, id);
    }

    tracing::trace!(url = %config.url, json = %message, "sending MCP HTTP request");

    let resp = req
        .send()
        .await
        .map_err(|e| McpError::transport(format!("HTTP request failed: {}", e)))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(McpError::transport(format!("HTTP error {}: {}", status, body)));
    }

    Ok(resp)
}

async fn read_http_response(resp: reqwest::Response, id: u64) -> Result<JsonRpcResponse> {
    let is_sse = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"));

    if is_sse {
        let mut events = resp.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| McpError::transport(format!("SSE error: {}", e)))?;
            if event.data.trim().is_empty() {
                continue;
            }
            let message: Value = serde_json::from_str(&event.data)?;
            if let Some(parsed) = JsonRpcResponse::match_id(message, id) {
                return Ok(parsed?);
            }
        }
        return Err(McpError::ConnectionClosed);
    }

    let body = resp
        .text()
        .await
        .map_err(|e| McpError::transport(format!("failed to read response body: {}", e)))?;

    tracing::trace!(json = %body, "received MCP HTTP response");

    let message: Value = serde_json::from_str(&body)?;
    JsonRpcResponse::match_id(message, id)
        .ok_or_else(|| McpError::protocol(format!("no response for request {}", id)))?
        .map_err(McpError::from)
}
