//! MCP client for communicating with a single MCP server.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::{McpError, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcNotification,
    JsonRpcRequest, ListToolsResult, ToolDescriptor,
};
use crate::transport::McpTransport;

/// How to reach a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Spawn a local process and talk over its stdio.
    Command {
        /// Program to run.
        command: String,
        /// Arguments passed to the program.
        args: Vec<String>,
    },
    /// Remote server reached over HTTP.
    Url(String),
}

/// A configured tool-providing server.
///
/// Placeholders in values are resolved before a descriptor is built; the
/// descriptor itself is treated as immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    /// Unique name for this server.
    pub name: String,
    /// Launch or connection directive.
    pub endpoint: Endpoint,
    /// Environment variables added to the spawned process.
    pub env: Vec<(String, String)>,
    /// HTTP headers sent to URL endpoints.
    pub headers: Vec<(String, String)>,
}

impl ServerDescriptor {
    /// Create a descriptor for a command endpoint.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: Endpoint::Command {
                command: command.into(),
                args: Vec::new(),
            },
            env: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Create a descriptor for a URL endpoint.
    pub fn url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: Endpoint::Url(url.into()),
            env: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Add an argument. Ignored for URL endpoints.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        if let Endpoint::Command { args, .. } = &mut self.endpoint {
            args.push(arg.into());
        }
        self
    }

    /// Add several arguments. Ignored for URL endpoints.
    pub fn with_args<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Endpoint::Command { args, .. } = &mut self.endpoint {
            args.extend(extra.into_iter().map(Into::into));
        }
        self
    }

    /// Add an environment variable.
    pub fn with_env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Add an HTTP header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// One-line rendering of the endpoint, e.g. `python server.py`.
    pub fn endpoint_summary(&self) -> String {
        match &self.endpoint {
            Endpoint::Command { command, args } if args.is_empty() => command.clone(),
            Endpoint::Command { command, args } => format!("{} {}", command, args.join(" ")),
            Endpoint::Url(url) => url.clone(),
        }
    }
}

/// An MCP client over one established transport.
///
/// Requests are serialized through the transport lock; ids are unique per
/// client.
pub struct McpClient {
    name: String,
    transport: Mutex<McpTransport>,
    request_id: AtomicU64,
}

impl McpClient {
    /// Wrap a transport. No traffic is sent until [`initialize`](Self::initialize).
    pub fn new(name: impl Into<String>, transport: McpTransport) -> Self {
        Self {
            name: name.into(),
            transport: Mutex::new(transport),
            request_id: AtomicU64::new(1),
        }
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = JsonRpcRequest::new(self.next_request_id(), method, params);
        let response = self.transport.lock().await.send_request(&request).await?;

        response
            .into_result()
            .map_err(|e| McpError::server_error(e.code, e.message, e.data))
    }

    async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.transport
            .lock()
            .await
            .send_notification(&notification)
            .await
    }

    /// Perform the MCP handshake.
    ///
    /// Sends `initialize`, parses the result, then sends
    /// `notifications/initialized`.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = InitializeParams::default();
        let result = self
            .send_request("initialize", Some(serde_json::to_value(&params)?))
            .await?;

        let init_result: InitializeResult = serde_json::from_value(result)
            .map_err(|e| McpError::protocol(format!("invalid initialize result: {}", e)))?;

        tracing::debug!(
            server = %self.name,
            remote = %init_result.server_info.name,
            version = %init_result.server_info.version,
            protocol = %init_result.protocol_version,
            "MCP server initialized"
        );

        self.send_notification("notifications/initialized", None)
            .await?;

        Ok(init_result)
    }

    /// Fetch the full tool catalog, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.take().map(|c| serde_json::json!({ "cursor": c }));
            let result = self.send_request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(server = %self.name, tool_count = tools.len(), "listed MCP tools");

        Ok(tools)
    }

    /// Call a tool on the server.
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result = self
            .send_request("tools/call", Some(serde_json::to_value(&params)?))
            .await?;
        let call_result: CallToolResult = serde_json::from_value(result)?;

        if call_result.is_error() {
            tracing::warn!(server = %self.name, tool = %name, "tool call returned error");
        } else {
            tracing::debug!(server = %self.name, tool = %name, "tool call succeeded");
        }

        Ok(call_result)
    }

    /// Shut the transport down.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::debug!(server = %self.name, "shutting down MCP client");
        self.transport.lock().await.shutdown().await
    }

    /// Check if the transport is still usable.
    ///
    /// A transport busy with a request counts as connected.
    pub fn is_connected(&self) -> bool {
        match self.transport.try_lock() {
            Ok(mut transport) => transport.is_connected(),
            Err(_) => true,
        }
    }
}
