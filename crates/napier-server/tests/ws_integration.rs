//! WebSocket integration tests.
//!
//! Each test starts a real server on a free port and talks to it over
//! tokio-tungstenite.

mod common;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use common::TestServer;
use napier_agent::directive::{NO_SERVERS, UNKNOWN_COMMAND};
use napier_agent::{HELP_TEXT, ServerCatalog};
use napier_llm::{CompletionRequest, CompletionResponse, LlmBackend, SharedBackend};
use napier_server::{HealthResponse, ServerConfig};

/// Replies after a fixed delay.
struct SlowBackend {
    delay: Duration,
}

#[async_trait]
impl LlmBackend for SlowBackend {
    async fn complete(&self, _request: CompletionRequest) -> napier_llm::Result<CompletionResponse> {
        tokio::time::sleep(self.delay).await;
        Ok(CompletionResponse::new("slow reply", "slow-model"))
    }

    fn name(&self) -> &str {
        "slow"
    }

    async fn health_check(&self) -> napier_llm::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_health_reports_backend() -> Result<()> {
    let server = TestServer::start().await?;

    let health: HealthResponse = server
        .client
        .get(format!("{}/health", server.base_url()))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(health.status, "ok");
    assert_eq!(health.backend, "mock");
    Ok(())
}

#[tokio::test]
async fn test_ping_pong() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "ping"})).await?;
    assert_eq!(ws.expect().await?, json!({"type": "pong"}));
    Ok(())
}

#[tokio::test]
async fn test_chat_turn_streams_events() -> Result<()> {
    let server = TestServer::start_with_responses(["Hello there"]).await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "chat", "message": "hi"})).await?;
    let frames = ws.collect_turn().await?;

    let kinds: Vec<&str> = frames
        .iter()
        .map(|f| f["event"]["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["ack", "progress", "success"]);

    assert_eq!(frames[0]["event"]["query"], "hi");
    assert_eq!(frames[1]["event"]["stage"], "response");
    assert_eq!(frames[1]["event"]["text"], "Hello there");
    Ok(())
}

#[tokio::test]
async fn test_backend_failure_ends_turn_with_error() -> Result<()> {
    // No scripted responses: the first completion fails.
    let server = TestServer::start_with_responses([]).await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "chat", "message": "hi"})).await?;
    let frames = ws.collect_turn().await?;

    let last = frames.last().unwrap();
    assert_eq!(last["event"]["kind"], "error");
    assert!(
        last["event"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Error processing query:")
    );
    Ok(())
}

#[tokio::test]
async fn test_list_servers() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "list_servers"})).await?;
    let frame = ws.expect().await?;

    assert_eq!(frame["type"], "servers");
    assert_eq!(frame["servers"][0]["name"], "weather");
    assert_eq!(frame["servers"][0]["endpoint"], "python weather.py");
    Ok(())
}

#[tokio::test]
async fn test_servers_directive_without_config() -> Result<()> {
    let backend: SharedBackend = Arc::new(napier_llm::MockBackend::with_text("unused"));
    let server =
        TestServer::start_with(backend, ServerCatalog::default(), ServerConfig::new()).await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "chat", "message": "/servers"})).await?;
    let frame = ws.expect().await?;

    assert_eq!(frame, json!({"type": "notice", "message": NO_SERVERS}));
    Ok(())
}

#[tokio::test]
async fn test_list_tools_requires_session() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "list_tools"})).await?;
    let frame = ws.expect().await?;

    assert_eq!(frame["type"], "error");
    assert_eq!(frame["code"], "not_connected");
    Ok(())
}

#[tokio::test]
async fn test_directives_over_chat() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "chat", "message": "/help"})).await?;
    assert_eq!(
        ws.expect().await?,
        json!({"type": "notice", "message": HELP_TEXT})
    );

    ws.send(json!({"type": "chat", "message": "/frobnicate"})).await?;
    assert_eq!(
        ws.expect().await?,
        json!({"type": "notice", "message": UNKNOWN_COMMAND})
    );

    ws.send(json!({"type": "chat", "message": "/disconnect"})).await?;
    assert_eq!(ws.expect().await?, json!({"type": "disconnected"}));
    Ok(())
}

#[tokio::test]
async fn test_connect_errors() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "connect", "server": "nope"})).await?;
    let frame = ws.expect().await?;
    assert_eq!(frame["code"], "server_not_found");

    ws.send(json!({"type": "chat", "message": "/connect server.rb"})).await?;
    let frame = ws.expect().await?;
    assert_eq!(frame["code"], "invalid_script");
    assert_eq!(frame["message"], "Server script must be a .py or .js file");
    Ok(())
}

#[tokio::test]
async fn test_invalid_json_is_reported() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "teleport"})).await?;
    let frame = ws.expect().await?;
    assert_eq!(frame["code"], "parse_error");

    // The connection survives.
    ws.send(json!({"type": "ping"})).await?;
    assert_eq!(ws.expect().await?["type"], "pong");
    Ok(())
}

#[tokio::test]
async fn test_second_turn_rejected_while_running() -> Result<()> {
    let backend: SharedBackend = Arc::new(SlowBackend {
        delay: Duration::from_millis(500),
    });
    let server = TestServer::start_with(backend, common::catalog(), ServerConfig::new()).await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "chat", "message": "first"})).await?;
    ws.send(json!({"type": "chat", "message": "second"})).await?;

    let frames = ws.collect_turn().await?;

    assert!(
        frames
            .iter()
            .any(|f| f["type"] == "error" && f["code"] == "turn_in_progress")
    );
    let acks: Vec<_> = frames
        .iter()
        .filter(|f| f["event"]["kind"] == "ack")
        .collect();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0]["event"]["query"], "first");
    assert_eq!(frames.last().unwrap()["event"]["kind"], "success");
    Ok(())
}

#[tokio::test]
async fn test_connections_are_independent() -> Result<()> {
    let backend: SharedBackend = Arc::new(SlowBackend {
        delay: Duration::from_millis(300),
    });
    let server = TestServer::start_with(backend, common::catalog(), ServerConfig::new()).await?;
    let mut a = server.ws().await?;
    let mut b = server.ws().await?;

    a.send(json!({"type": "chat", "message": "from a"})).await?;
    b.send(json!({"type": "chat", "message": "from b"})).await?;

    let frames_a = a.collect_turn().await?;
    let frames_b = b.collect_turn().await?;

    assert_eq!(frames_a[0]["event"]["query"], "from a");
    assert_eq!(frames_b[0]["event"]["query"], "from b");
    assert_eq!(frames_a.last().unwrap()["event"]["kind"], "success");
    assert_eq!(frames_b.last().unwrap()["event"]["kind"], "success");
    Ok(())
}

#[tokio::test]
async fn test_exit_directive_closes_connection() -> Result<()> {
    let server = TestServer::start().await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "chat", "message": "/exit"})).await?;
    assert!(ws.recv().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_idle_connection_is_closed() -> Result<()> {
    let backend: SharedBackend = Arc::new(napier_llm::MockBackend::with_text("unused"));
    let config = ServerConfig::new().with_idle_timeout(Duration::from_millis(200));
    let server = TestServer::start_with(backend, common::catalog(), config).await?;
    let mut ws = server.ws().await?;

    let frame = ws.expect().await?;
    assert_eq!(frame["code"], "idle_timeout");
    assert!(ws.recv().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_long_turn_outlives_idle_timeout() -> Result<()> {
    let backend: SharedBackend = Arc::new(SlowBackend {
        delay: Duration::from_millis(1500),
    });
    let config = ServerConfig::new().with_idle_timeout(Duration::from_millis(500));
    let server = TestServer::start_with(backend, common::catalog(), config).await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "chat", "message": "take your time"})).await?;
    let frames = ws.collect_turn().await?;

    assert!(frames.iter().all(|f| f["type"] == "turn"));
    assert!(frames.iter().any(|f| f["event"]["text"] == "slow reply"));
    assert_eq!(frames.last().unwrap()["event"]["kind"], "success");

    // Idle again once the turn is over
    let frame = ws.expect().await?;
    assert_eq!(frame["code"], "idle_timeout");
    assert!(ws.recv().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_exit_mid_turn_ends_turn_with_error() -> Result<()> {
    let backend: SharedBackend = Arc::new(SlowBackend {
        delay: Duration::from_secs(30),
    });
    let server = TestServer::start_with(backend, common::catalog(), ServerConfig::new()).await?;
    let mut ws = server.ws().await?;

    ws.send(json!({"type": "chat", "message": "never answered"})).await?;
    let ack = ws.expect().await?;
    assert_eq!(ack["event"]["kind"], "ack");

    ws.send(json!({"type": "chat", "message": "/exit"})).await?;
    let frames = ws.collect_turn().await?;
    let last = frames.last().unwrap();
    assert_eq!(last["event"]["kind"], "error");
    assert_eq!(last["event"]["message"], "turn aborted");
    assert!(ws.recv().await?.is_none());
    Ok(())
}
