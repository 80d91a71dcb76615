//! WebSocket server for Napier.
//!
//! Exposes the orchestrator to remote clients. Every WebSocket connection is
//! an independent client context with its own tool session and conversation;
//! turn progress is streamed back as it happens.
//!
//! # Example
//!
//! ```ignore
//! use napier_server::{Server, ServerConfig};
//!
//! let server = Server::new(backend, AgentConfig::default(), catalog, ServerConfig::new());
//! server.run().await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use routes::{ClientMessage, HealthResponse, ServerMessage};
pub use state::AppState;

use std::net::SocketAddr;

use axum::Router;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use napier_agent::{AgentConfig, ServerCatalog};
use napier_llm::SharedBackend;

/// The Napier WebSocket server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server.
    pub fn new(
        backend: SharedBackend,
        agent_config: AgentConfig,
        servers: ServerCatalog,
        config: ServerConfig,
    ) -> Self {
        Self {
            state: AppState::new(backend, agent_config, servers, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        use axum::routing::get;

        let mut router = Router::new()
            .merge(routes::health_routes())
            .route("/ws", get(routes::ws_handler));

        if let Some(cors) = cors_layer(&self.state.config().cors_origins) {
            router = router.layer(cors);
        }

        router
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.bind_address();
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        info!("Starting server on {}", addr);

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config().bind_address
    }
}

/// `*` allows any origin; unparseable origins are skipped.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return Some(layer.allow_origin(Any));
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(layer.allow_origin(allowed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use napier_llm::MockBackend;
    use tower::ServiceExt;

    fn create_test_server(config: ServerConfig) -> Server {
        let backend = Arc::new(MockBackend::with_text("Test response"));
        Server::new(backend, AgentConfig::default(), ServerCatalog::default(), config)
    }

    #[tokio::test]
    async fn test_server_health_endpoint() {
        let server = create_test_server(ServerConfig::new());
        let app = server.router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_header_for_allowed_origin() {
        let config = ServerConfig::new().with_cors_origins(vec!["http://localhost:3000".into()]);
        let app = create_test_server(config).router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn test_ws_route_rejects_plain_get() {
        let app = create_test_server(ServerConfig::new()).router();
        let response = app
            .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }

    #[test]
    fn test_cors_layer_disabled_without_origins() {
        assert!(cors_layer(&[]).is_none());
        assert!(cors_layer(&["*".to_string()]).is_some());
    }
}
