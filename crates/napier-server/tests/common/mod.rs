//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use napier_agent::{AgentConfig, ServerCatalog};
use napier_config::{NapierConfig, SecretResolver};
use napier_llm::{MockBackend, SharedBackend};
use napier_server::{Server, ServerConfig};

/// How long a test waits for any single frame.
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a test server replying with a single canned response.
    pub async fn start() -> Result<Self> {
        Self::start_with_responses(["Test response"]).await
    }

    /// Start a test server with scripted model responses.
    pub async fn start_with_responses<const N: usize>(responses: [&str; N]) -> Result<Self> {
        let backend: SharedBackend = Arc::new(MockBackend::with_texts(responses));
        Self::start_with(backend, catalog(), ServerConfig::new()).await
    }

    /// Start a test server with an explicit backend, catalog and config.
    pub async fn start_with(
        backend: SharedBackend,
        servers: ServerCatalog,
        config: ServerConfig,
    ) -> Result<Self> {
        let addr = find_available_port().await?;
        let config = config.with_bind_address(addr);

        let server = Server::new(backend, AgentConfig::default(), servers, config);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            _handle: handle,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Open a WebSocket connection.
    pub async fn ws(&self) -> Result<WsClient> {
        let (stream, _) = connect_async(format!("ws://{}/ws", self.addr)).await?;
        Ok(WsClient { stream })
    }
}

/// Catalog with one configured (but unreachable) server.
pub fn catalog() -> ServerCatalog {
    let config = NapierConfig::from_json(
        r#"{
            "mcpServers": {"weather": {"command": "python", "args": ["weather.py"]}},
            "defaults": {"server": "weather"}
        }"#,
    )
    .expect("valid test config");
    ServerCatalog::new(config, SecretResolver::env_only())
}

/// A JSON-speaking WebSocket client.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Send a JSON frame.
    pub async fn send(&mut self, msg: Value) -> Result<()> {
        self.stream.send(Message::Text(msg.to_string().into())).await?;
        Ok(())
    }

    /// Receive the next JSON frame, skipping control frames.
    ///
    /// Returns `None` once the server closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Value>> {
        loop {
            let next = timeout(FRAME_TIMEOUT, self.stream.next())
                .await
                .map_err(|_| anyhow::anyhow!("Timeout waiting for frame"))?;
            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(serde_json::from_str(text.as_str())?)),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Receive a frame the test expects to exist.
    pub async fn expect(&mut self) -> Result<Value> {
        self.recv()
            .await?
            .ok_or_else(|| anyhow::anyhow!("Connection closed unexpectedly"))
    }

    /// Collect frames until a turn's terminal event, inclusive.
    pub async fn collect_turn(&mut self) -> Result<Vec<Value>> {
        let mut frames = Vec::new();
        loop {
            let frame = self.expect().await?;
            let terminal = frame["type"] == "turn"
                && matches!(frame["event"]["kind"].as_str(), Some("success" | "error"));
            frames.push(frame);
            if terminal {
                return Ok(frames);
            }
        }
    }
}

/// Find an available port for the test server.
async fn find_available_port() -> Result<SocketAddr> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}

/// Wait for the server to become ready.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{}/health", addr);

    let ready = timeout(Duration::from_secs(5), async {
        loop {
            match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    })
    .await;

    match ready {
        Ok(()) => Ok(()),
        Err(_) => anyhow::bail!("Timeout waiting for server to start"),
    }
}
