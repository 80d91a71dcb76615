//! Session lifecycle for one client context.
//!
//! A [`SessionManager`] owns at most one live session. State moves
//! `Disconnected → Connecting → Connected → Disconnected`; a failed or
//! cancelled connect goes straight back to `Disconnected`, and nothing
//! partially initialized is ever visible to callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::client::{McpClient, ServerDescriptor};
use crate::error::{McpError, Result};
use crate::invocation::ToolInvocationResult;
use crate::negotiate::{Negotiated, Negotiator, TransportKind};
use crate::protocol::{ServerInfo, ToolDescriptor};

/// Connection state of a [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Snapshot of a connected session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Name of the descriptor the session was opened from.
    pub server: String,
    /// Tier that completed the handshake.
    pub transport: TransportKind,
    /// Identity reported by the server.
    pub server_info: ServerInfo,
    /// Cached tool catalog.
    pub tools: Vec<ToolDescriptor>,
}

impl Session {
    /// Look up a tool in the cached catalog.
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }
}

struct ActiveSession {
    session: Session,
    client: Arc<McpClient>,
    /// Cancelled on disconnect; outstanding invocations race against it.
    cancel: CancellationToken,
    tools_stale: bool,
}

enum Inner {
    Disconnected,
    Connecting {
        attempt: u64,
        cancel: CancellationToken,
    },
    Connected(ActiveSession),
}

/// Owns the lifecycle of the session with one tool-providing server.
pub struct SessionManager {
    inner: Mutex<Inner>,
    negotiator: Negotiator,
    next_attempt: AtomicU64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Negotiator::default())
    }
}

impl SessionManager {
    pub fn new(negotiator: Negotiator) -> Self {
        Self {
            inner: Mutex::new(Inner::Disconnected),
            negotiator,
            next_attempt: AtomicU64::new(1),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect to a server, replacing any current session.
    ///
    /// Runs negotiation and fetches the tool catalog. Fails with
    /// [`McpError::ConnectInProgress`] if another connect is running, and
    /// with [`McpError::Cancelled`] if [`disconnect`](Self::disconnect) is
    /// called before it completes.
    pub async fn connect(&self, descriptor: &ServerDescriptor) -> Result<Session> {
        let attempt = self.next_attempt.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();

        let previous = {
            let mut inner = self.inner.lock();
            if matches!(*inner, Inner::Connecting { .. }) {
                return Err(McpError::ConnectInProgress);
            }
            std::mem::replace(
                &mut *inner,
                Inner::Connecting {
                    attempt,
                    cancel: cancel.clone(),
                },
            )
        };

        let mut guard = ConnectGuard {
            inner: &self.inner,
            attempt,
            armed: true,
        };

        if let Inner::Connected(active) = previous {
            tracing::info!(server = %active.session.server, "disconnecting previous session");
            close(active).await;
        }

        tracing::info!(server = %descriptor.name, "connecting");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(McpError::Cancelled),
            result = self.establish(descriptor) => result,
        };
        guard.armed = false;

        let mut inner = self.inner.lock();
        let current = matches!(*inner, Inner::Connecting { attempt: a, .. } if a == attempt);
        if !current {
            // A disconnect took the attempt away; the client, if any, drops here
            // and its child process with it.
            return Err(McpError::Cancelled);
        }

        match outcome {
            Ok((session, client)) => {
                tracing::info!(
                    server = %session.server,
                    tier = %session.transport,
                    tools = session.tools.len(),
                    "session connected"
                );
                *inner = Inner::Connected(ActiveSession {
                    session: session.clone(),
                    client,
                    cancel,
                    tools_stale: false,
                });
                Ok(session)
            }
            Err(e) => {
                tracing::warn!(server = %descriptor.name, error = %e, "connect failed");
                *inner = Inner::Disconnected;
                Err(e)
            }
        }
    }

    async fn establish(&self, descriptor: &ServerDescriptor) -> Result<(Session, Arc<McpClient>)> {
        let Negotiated { client, kind, init } = self.negotiator.negotiate(descriptor).await?;

        let tools = match client.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                let _ = client.shutdown().await;
                return Err(e);
            }
        };

        let session = Session {
            server: descriptor.name.clone(),
            transport: kind,
            server_info: init.server_info,
            tools,
        };
        Ok((session, Arc::new(client)))
    }

    /// Drop the current session or cancel a connect in flight.
    ///
    /// Outstanding invocations resolve with an error result. A no-op when
    /// already disconnected.
    pub async fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.inner.lock(), Inner::Disconnected);

        match previous {
            Inner::Disconnected => {}
            Inner::Connecting { cancel, .. } => {
                tracing::info!("cancelling connect attempt");
                cancel.cancel();
            }
            Inner::Connected(active) => {
                tracing::info!(server = %active.session.server, "disconnecting");
                close(active).await;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tools
    // ─────────────────────────────────────────────────────────────────────────

    /// The session's tool catalog.
    ///
    /// Refreshed from the server first if [`invalidate_tools`](Self::invalidate_tools)
    /// was called.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let client = {
            let inner = self.inner.lock();
            let Inner::Connected(active) = &*inner else {
                return Err(McpError::NotConnected);
            };
            if !active.tools_stale {
                return Ok(active.session.tools.clone());
            }
            active.client.clone()
        };

        let tools = match client.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if e.is_transport_failure() {
                    self.drop_session(&client).await;
                }
                return Err(e);
            }
        };

        let mut inner = self.inner.lock();
        if let Inner::Connected(active) = &mut *inner
            && Arc::ptr_eq(&active.client, &client)
        {
            active.session.tools = tools.clone();
            active.tools_stale = false;
        }
        Ok(tools)
    }

    /// Mark the cached catalog stale so the next [`list_tools`](Self::list_tools)
    /// refetches it.
    pub fn invalidate_tools(&self) {
        if let Inner::Connected(active) = &mut *self.inner.lock() {
            active.tools_stale = true;
        }
    }

    /// Invoke a tool on the current session.
    ///
    /// Session-state problems are errors. Anything that goes wrong once the
    /// call is on the wire comes back as an error-status result; a transport
    /// failure also ends the session.
    pub async fn invoke(
        &self,
        tool_name: &str,
        parameters: Map<String, Value>,
    ) -> Result<ToolInvocationResult> {
        let (client, cancel) = {
            let inner = self.inner.lock();
            let Inner::Connected(active) = &*inner else {
                return Err(McpError::NotConnected);
            };
            if active.session.tool(tool_name).is_none() {
                return Err(McpError::UnknownTool(tool_name.to_string()));
            }
            (active.client.clone(), active.cancel.clone())
        };

        tracing::debug!(tool = %tool_name, server = %client.name(), "invoking tool");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(tool = %tool_name, "invocation cancelled by disconnect");
                return Ok(ToolInvocationResult::error(format!(
                    "Tool '{}' was cancelled because the session disconnected",
                    tool_name
                )));
            }
            result = client.call_tool(tool_name, parameters) => result,
        };

        match outcome {
            Ok(result) => Ok(result.into()),
            Err(e) if e.is_transport_failure() => {
                tracing::warn!(tool = %tool_name, error = %e, "transport failed during invocation");
                self.drop_session(&client).await;
                Ok(ToolInvocationResult::error(format!(
                    "Error calling tool '{}': {}",
                    tool_name, e
                )))
            }
            Err(e) => Ok(ToolInvocationResult::error(format!(
                "Error calling tool '{}': {}",
                tool_name, e
            ))),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        match &*self.inner.lock() {
            Inner::Disconnected => SessionState::Disconnected,
            Inner::Connecting { .. } => SessionState::Connecting,
            Inner::Connected(_) => SessionState::Connected,
        }
    }

    /// Snapshot of the current session, if connected.
    pub fn session(&self) -> Option<Session> {
        match &*self.inner.lock() {
            Inner::Connected(active) => Some(active.session.clone()),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Name of the connected server, if any.
    pub fn server_name(&self) -> Option<String> {
        match &*self.inner.lock() {
            Inner::Connected(active) => Some(active.session.server.clone()),
            _ => None,
        }
    }

    /// Tear down the session owning `client` after a transport failure.
    async fn drop_session(&self, client: &Arc<McpClient>) {
        let dropped = {
            let mut inner = self.inner.lock();
            match &*inner {
                Inner::Connected(active) if Arc::ptr_eq(&active.client, client) => {
                    match std::mem::replace(&mut *inner, Inner::Disconnected) {
                        Inner::Connected(active) => Some(active),
                        _ => None,
                    }
                }
                _ => None,
            }
        };

        if let Some(active) = dropped {
            tracing::warn!(server = %active.session.server, "session lost");
            close(active).await;
        }
    }
}

/// Rolls a `Connecting` state back to `Disconnected` when the connect future
/// is dropped before it finishes.
struct ConnectGuard<'a> {
    inner: &'a Mutex<Inner>,
    attempt: u64,
    armed: bool,
}

impl Drop for ConnectGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock();
        if let Inner::Connecting { attempt, cancel } = &*inner
            && *attempt == self.attempt
        {
            tracing::debug!(attempt = self.attempt, "connect abandoned");
            cancel.cancel();
            *inner = Inner::Disconnected;
        }
    }
}

async fn close(active: ActiveSession) {
    active.cancel.cancel();
    if let Err(e) = active.client.shutdown().await {
        tracing::debug!(server = %active.session.server, error = %e, "shutdown error");
    }
}
