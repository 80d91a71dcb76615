//! MCP (Model Context Protocol) client for Napier.
//!
//! This crate connects Napier to tool-providing MCP servers: it negotiates a
//! transport, performs the handshake, caches the tool catalog and invokes tools
//! on behalf of the orchestration loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SessionManager                                             │
//! │  - One live session per client context                      │
//! │  - connect / list_tools / invoke / disconnect               │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Negotiator                                                 │
//! │  - Tries transport tiers in order, first handshake wins     │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  McpClient / McpTransport                                   │
//! │  - initialize, tools/list, tools/call                       │
//! │  - stdio (lines or Content-Length) or HTTP (plain/SSE)      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use napier_mcp::{ServerDescriptor, SessionManager};
//!
//! let manager = SessionManager::default();
//! let desc = ServerDescriptor::new("weather", "python").with_arg("weather.py");
//!
//! let session = manager.connect(&desc).await?;
//! println!("Connected over {} with {} tools", session.transport, session.tools.len());
//!
//! let mut params = serde_json::Map::new();
//! params.insert("city".into(), "Oslo".into());
//! let result = manager.invoke("forecast", params).await?;
//! println!("{}", result.content);
//!
//! manager.disconnect().await;
//! ```
//!
//! # Transport tiers
//!
//! | Endpoint | Tiers, in order                     |
//! |----------|-------------------------------------|
//! | command  | `stdio-lines`, `stdio-framed`       |
//! | URL      | `streamable-http`, `http-post`      |
//!
//! The handshake on every tier is:
//! 1. Client sends `initialize` with capabilities
//! 2. Server responds with its capabilities
//! 3. Client sends `notifications/initialized`
//! 4. Client can now call `tools/list` and `tools/call`

pub mod client;
pub mod error;
pub mod invocation;
pub mod negotiate;
pub mod protocol;
pub mod session;
pub mod transport;

pub use client::{Endpoint, McpClient, ServerDescriptor};
pub use error::{McpError, Result};
pub use invocation::{InvocationStatus, ToolInvocationRequest, ToolInvocationResult};
pub use negotiate::{
    DEFAULT_HANDSHAKE_TIMEOUT, Negotiated, Negotiator, TierFailure, TransportKind, tiers_for,
};
pub use protocol::{
    CallToolResult, InitializeResult, ServerInfo, ToolContent, ToolDescriptor, ToolParameter,
};
pub use session::{Session, SessionManager, SessionState};
pub use transport::{HttpTransportConfig, McpTransport, StdioFraming};
