//! Turn-level behaviour of the orchestration loop against scripted tools.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use napier_agent::{
    AgentConfig, Conversation, NoTools, Orchestrator, ProgressStage, RelayEvent, RelayReceiver,
    ToolProvider, TurnRelay,
};
use napier_llm::{LlmError, MockBackend, MockResponse, Role};
use napier_mcp::{ToolDescriptor, ToolInvocationRequest, ToolInvocationResult};

/// Serves `echo(text)` and records every invocation.
#[derive(Default)]
struct EchoTools {
    calls: Mutex<Vec<ToolInvocationRequest>>,
}

#[async_trait]
impl ToolProvider for EchoTools {
    async fn catalog(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "echo",
            "Echo text back",
            json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        )]
    }

    async fn invoke(&self, request: &ToolInvocationRequest) -> ToolInvocationResult {
        self.calls.lock().push(request.clone());
        if request.tool_name != "echo" {
            return ToolInvocationResult::error(format!(
                "Error calling tool '{}': unknown tool: {}",
                request.tool_name, request.tool_name
            ));
        }
        let text = request
            .parameters
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        ToolInvocationResult::success(text)
    }
}

fn drain(rx: &mut RelayReceiver) -> Vec<RelayEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

const ECHO_CALL: &str = "```json\n{\"tool_name\":\"echo\",\"parameters\":{\"text\":\"hi\"}}\n```";

#[tokio::test]
async fn test_no_tool_block_single_reply() {
    let backend = Arc::new(MockBackend::with_text("Nothing to call here."));
    let orchestrator = Orchestrator::new(backend.clone(), AgentConfig::default());
    let tools = EchoTools::default();
    let mut conversation = Conversation::new();
    let (relay, mut rx) = TurnRelay::start("hello");

    let summary = orchestrator
        .run_turn(&mut conversation, &tools, "hello", relay)
        .await;

    assert!(summary.is_success());
    assert!(tools.calls.lock().is_empty());
    assert_eq!(conversation.len(), 2);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], RelayEvent::Ack { query, .. } if query == "hello"));
    assert!(matches!(
        &events[1],
        RelayEvent::Progress { stage: ProgressStage::Response, .. }
    ));
    assert!(matches!(events[2], RelayEvent::Success { .. }));

    // Tools in the catalog switch the prompt and temperature.
    let request = &backend.requests()[0];
    assert!(request.system.as_deref().unwrap().contains("- echo: Echo text back"));
    assert_eq!(request.options.temperature, 0.2);
}

#[tokio::test]
async fn test_echo_end_to_end() {
    let backend = Arc::new(MockBackend::with_texts([
        format!("Let me echo that.\n{}", ECHO_CALL),
        "The tool said hi.".to_string(),
    ]));
    let orchestrator = Orchestrator::new(backend.clone(), AgentConfig::default());
    let tools = EchoTools::default();
    let mut conversation = Conversation::new();
    let (relay, mut rx) = TurnRelay::start("say hi");

    let summary = orchestrator
        .run_turn(&mut conversation, &tools, "say hi", relay)
        .await;

    // One invocation with the extracted parameters.
    let calls = tools.calls.lock().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool_name, "echo");
    assert_eq!(
        serde_json::Value::Object(calls[0].parameters.clone()),
        json!({"text": "hi"})
    );

    // user, assistant, tool result, assistant
    let history = conversation.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert!(history[2].is_tool_result());
    assert_eq!(history[2].tool_name.as_deref(), Some("echo"));
    assert!(history[2].content.contains("hi"));
    assert_eq!(history[3].role, Role::Assistant);
    assert_eq!(history[3].content, "The tool said hi.");

    assert_eq!(summary.replies.len(), 2);
    assert_eq!(summary.invocations.len(), 1);

    // ack, response, tool result, follow-up, success
    let events = drain(&mut rx);
    assert_eq!(events.len(), 5);
    assert!(matches!(
        &events[2],
        RelayEvent::Progress { stage: ProgressStage::ToolResult, text, tool: Some(t), .. }
            if text == "hi" && t == "echo"
    ));
    assert!(matches!(
        &events[3],
        RelayEvent::Progress { stage: ProgressStage::FollowUp, .. }
    ));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(matches!(events[4], RelayEvent::Success { .. }));

    // The follow-up carries a transient directive that is not kept in history.
    let follow_up = &backend.requests()[1];
    let last = follow_up.last_message().unwrap();
    assert_eq!(last.role, Role::User);
    assert!(last.content.starts_with("The tool 'echo' returned the following result:"));
    assert_eq!(follow_up.messages.len(), 4);
}

#[tokio::test]
async fn test_follow_up_replies_are_not_extracted() {
    let backend = Arc::new(MockBackend::with_texts([ECHO_CALL, ECHO_CALL]));
    let orchestrator = Orchestrator::new(backend.clone(), AgentConfig::default());
    let tools = EchoTools::default();
    let (relay, _rx) = TurnRelay::start("q");

    orchestrator
        .run_turn(&mut Conversation::new(), &tools, "q", relay)
        .await;

    assert_eq!(tools.calls.lock().len(), 1);
    assert_eq!(backend.request_count(), 2);
}

#[tokio::test]
async fn test_tool_error_still_followed_up() {
    let backend = Arc::new(MockBackend::with_texts([
        "```json\n{\"tool_name\":\"nope\",\"parameters\":{}}\n```",
        "That tool does not exist.",
    ]));
    let orchestrator = Orchestrator::new(backend, AgentConfig::default());
    let tools = EchoTools::default();
    let mut conversation = Conversation::new();
    let (relay, mut rx) = TurnRelay::start("q");

    let summary = orchestrator
        .run_turn(&mut conversation, &tools, "q", relay)
        .await;

    assert!(summary.is_success());
    assert!(summary.invocations[0].1.is_error());
    assert!(conversation.history()[2].content.starts_with("Error calling tool 'nope'"));
    assert_eq!(conversation.len(), 4);
    assert!(matches!(drain(&mut rx).last(), Some(RelayEvent::Success { .. })));
}

#[tokio::test]
async fn test_follow_up_failure_terminates_with_error() {
    let backend = Arc::new(MockBackend::new(vec![
        MockResponse::Text(ECHO_CALL.to_string()),
        MockResponse::Error(LlmError::Backend("overloaded".into())),
    ]));
    let orchestrator = Orchestrator::new(backend, AgentConfig::default());
    let tools = EchoTools::default();
    let mut conversation = Conversation::new();
    let (relay, mut rx) = TurnRelay::start("q");

    let summary = orchestrator
        .run_turn(&mut conversation, &tools, "q", relay)
        .await;

    assert!(!summary.is_success());
    assert_eq!(summary.invocations.len(), 1);
    let last = conversation.last().unwrap();
    assert_eq!(last.role, Role::Assistant);
    assert!(last.content.starts_with("Error processing query:"));

    let events = drain(&mut rx);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(matches!(events.last(), Some(RelayEvent::Error { .. })));
}

#[tokio::test]
async fn test_history_carries_across_turns() {
    let backend = Arc::new(MockBackend::with_texts(["first", "second"]));
    let orchestrator = Orchestrator::new(backend.clone(), AgentConfig::default());
    let mut conversation = Conversation::new();

    for query in ["one", "two"] {
        let (relay, _rx) = TurnRelay::start(query);
        orchestrator
            .run_turn(&mut conversation, &NoTools, query, relay)
            .await;
    }

    assert_eq!(conversation.len(), 4);
    assert_eq!(backend.requests()[1].messages.len(), 3);
}
