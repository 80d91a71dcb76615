//! Application state shared by all connections.

use std::sync::Arc;

use napier_agent::{AgentConfig, Orchestrator, ServerCatalog};
use napier_llm::SharedBackend;
use napier_mcp::{Negotiator, SessionManager};

use crate::config::ServerConfig;

/// Shared, read-only state. Per-connection mutable state lives in the
/// connection handler.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    orchestrator: Arc<Orchestrator>,
    servers: ServerCatalog,
    config: ServerConfig,
}

impl AppState {
    pub fn new(
        backend: SharedBackend,
        agent_config: AgentConfig,
        servers: ServerCatalog,
        config: ServerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                orchestrator: Arc::new(Orchestrator::new(backend, agent_config)),
                servers,
                config,
            }),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.inner.orchestrator
    }

    pub fn servers(&self) -> &ServerCatalog {
        &self.inner.servers
    }

    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// A fresh session manager for a new client context.
    pub fn new_session_manager(&self) -> SessionManager {
        SessionManager::new(
            Negotiator::new().with_handshake_timeout(self.inner.config.handshake_timeout),
        )
    }
}
