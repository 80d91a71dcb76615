//! The turn loop: query → model → tool calls → follow-ups.
//!
//! ```text
//! user query
//!     │
//!     ▼
//! ┌──────────┐   no blocks   ┌─────────┐
//! │  model   │──────────────▶│ success │
//! └──────────┘               └─────────┘
//!     │ ```json blocks            ▲
//!     ▼                           │
//! ┌──────────┐   ┌──────────┐     │
//! │  invoke  │──▶│ follow-up│─────┘  (per request, one level deep)
//! └──────────┘   └──────────┘
//! ```

use napier_llm::{ChatMessage, CompletionRequest, GenerationOptions, SharedBackend};
use napier_mcp::{ToolInvocationRequest, ToolInvocationResult};

use crate::extract::extract_tool_calls;
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, follow_up_prompt, tool_system_prompt};
use crate::relay::{ProgressStage, TurnRelay};
use crate::tools::ToolProvider;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling and prompt settings for the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Model override passed to the backend.
    pub model: Option<String>,
    /// Temperature when a tool catalog is in the prompt.
    pub tool_temperature: f32,
    /// Temperature for plain chat.
    pub chat_temperature: f32,
    pub max_output_tokens: u32,
    /// Preamble for plain chat.
    pub system_prompt: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            tool_temperature: 0.2,
            chat_temperature: 0.7,
            max_output_tokens: 2048,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AgentConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_tool_temperature(mut self, temperature: f32) -> Self {
        self.tool_temperature = temperature;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only history for one client context.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.history.last()
    }

    fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

/// What a finished turn did, for callers that do not watch the relay.
#[derive(Debug, Clone, Default)]
pub struct TurnSummary {
    /// Assistant messages appended during the turn, in order.
    pub replies: Vec<String>,
    /// Executed requests and their results, in order.
    pub invocations: Vec<(ToolInvocationRequest, ToolInvocationResult)>,
    /// Set when the model backend failed.
    pub error: Option<String>,
}

impl TurnSummary {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives turns against a model backend.
pub struct Orchestrator {
    backend: SharedBackend,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(backend: SharedBackend, config: AgentConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run one user turn.
    ///
    /// Never fails: backend errors become an assistant message plus the
    /// relay's error event, tool errors become tool-result messages.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        tools: &dyn ToolProvider,
        query: &str,
        relay: TurnRelay,
    ) -> TurnSummary {
        let mut summary = TurnSummary::default();
        conversation.push(ChatMessage::user(query));

        let catalog = tools.catalog().await;
        let (system, temperature) = if catalog.is_empty() {
            (self.config.system_prompt.clone(), self.config.chat_temperature)
        } else {
            (tool_system_prompt(&catalog), self.config.tool_temperature)
        };
        let options = GenerationOptions {
            temperature,
            max_output_tokens: self.config.max_output_tokens,
        };

        tracing::debug!(
            tools = catalog.len(),
            history = conversation.len(),
            temperature,
            "Starting turn"
        );

        let text = match self
            .complete(&system, options, conversation.history().to_vec())
            .await
        {
            Ok(text) => text,
            Err(message) => return Self::abort(conversation, relay, summary, message),
        };

        let extraction = extract_tool_calls(&text);
        conversation.push(ChatMessage::assistant(text.clone()));
        relay.progress(ProgressStage::Response, text.clone(), None);
        summary.replies.push(text);

        for request in extraction.requests {
            tracing::info!(tool = %request.tool_name, "Executing tool call");
            let result = tools.invoke(&request).await;
            if result.is_error() {
                tracing::warn!(tool = %request.tool_name, "Tool returned an error");
            }

            conversation.push(ChatMessage::tool_result(
                request.tool_name.clone(),
                result.content.clone(),
            ));
            relay.progress(
                ProgressStage::ToolResult,
                result.content.clone(),
                Some(&request.tool_name),
            );

            let mut messages = conversation.history().to_vec();
            messages.push(ChatMessage::user(follow_up_prompt(
                &request.tool_name,
                &result.content,
            )));

            let reply = match self.complete(&system, options, messages).await {
                Ok(reply) => reply,
                Err(message) => {
                    summary.invocations.push((request, result));
                    return Self::abort(conversation, relay, summary, message);
                }
            };

            conversation.push(ChatMessage::assistant(reply.clone()));
            relay.progress(ProgressStage::FollowUp, reply.clone(), Some(&request.tool_name));
            summary.replies.push(reply);
            summary.invocations.push((request, result));
        }

        relay.succeed();
        summary
    }

    async fn complete(
        &self,
        system: &str,
        options: GenerationOptions,
        messages: Vec<ChatMessage>,
    ) -> Result<String, String> {
        let mut request = CompletionRequest::new(messages)
            .with_system(system)
            .with_options(options);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }

        match self.backend.complete(request).await {
            Ok(response) => Ok(response.text),
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "Completion failed");
                Err(format!("Error processing query: {}", e))
            }
        }
    }

    fn abort(
        conversation: &mut Conversation,
        relay: TurnRelay,
        mut summary: TurnSummary,
        message: String,
    ) -> TurnSummary {
        conversation.push(ChatMessage::assistant(message.clone()));
        relay.fail(message.clone());
        summary.error = Some(message);
        summary
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use napier_llm::{LlmError, MockBackend, MockResponse, Role};

    use super::*;
    use crate::relay::{RelayEvent, RelayReceiver};
    use crate::tools::NoTools;

    fn drain(rx: &mut RelayReceiver) -> Vec<RelayEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_plain_reply() {
        let backend = Arc::new(MockBackend::with_text("Hello!"));
        let orchestrator = Orchestrator::new(backend.clone(), AgentConfig::default());
        let mut conversation = Conversation::new();
        let (relay, mut rx) = TurnRelay::start("hi");

        let summary = orchestrator
            .run_turn(&mut conversation, &NoTools, "hi", relay)
            .await;

        assert!(summary.is_success());
        assert!(summary.invocations.is_empty());
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.history()[1].role, Role::Assistant);
        assert_eq!(conversation.history()[1].content, "Hello!");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[2], RelayEvent::Success { .. }));

        let request = &backend.requests()[0];
        assert_eq!(request.system.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(request.options.temperature, 0.7);
    }

    #[tokio::test]
    async fn test_backend_failure_becomes_assistant_message() {
        let backend = Arc::new(MockBackend::new(vec![MockResponse::Error(LlmError::Auth(
            "bad key".into(),
        ))]));
        let orchestrator = Orchestrator::new(backend, AgentConfig::default());
        let mut conversation = Conversation::new();
        let (relay, mut rx) = TurnRelay::start("hi");

        let summary = orchestrator
            .run_turn(&mut conversation, &NoTools, "hi", relay)
            .await;

        let error = summary.error.unwrap();
        assert!(error.starts_with("Error processing query: "));
        assert_eq!(conversation.last().unwrap().role, Role::Assistant);
        assert_eq!(conversation.last().unwrap().content, error);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], RelayEvent::Error { message, .. } if *message == error));
    }

    #[tokio::test]
    async fn test_model_override_is_forwarded() {
        let backend = Arc::new(MockBackend::with_text("ok"));
        let orchestrator = Orchestrator::new(
            backend.clone(),
            AgentConfig::default().with_model("gemini-1.5-pro"),
        );
        let (relay, _rx) = TurnRelay::start("q");
        orchestrator
            .run_turn(&mut Conversation::new(), &NoTools, "q", relay)
            .await;

        assert_eq!(backend.requests()[0].model.as_deref(), Some("gemini-1.5-pro"));
    }
}
