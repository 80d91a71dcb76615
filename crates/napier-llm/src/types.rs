//! Conversation and completion types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One entry in a conversation history.
///
/// Messages are immutable once created; histories only grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Set on messages carrying a tool's output.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tool_result: bool,
    /// Tool that produced the content, for tool-result messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_result: false,
            tool_name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// A system-role message holding a tool's output.
    pub fn tool_result(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_result: true,
            tool_name: Some(tool_name.into()),
            ..Self::new(Role::System, content)
        }
    }

    pub fn is_tool_result(&self) -> bool {
        self.tool_result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests & Responses
// ─────────────────────────────────────────────────────────────────────────────

/// Sampling options for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 2048,
        }
    }
}

/// A completion request: system preamble, ordered history and options.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub options: GenerationOptions,
    /// Overrides the backend's configured model.
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            system: None,
            messages,
            options: GenerationOptions::default(),
            model: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The most recent message, usually the query being answered.
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }
}

/// Text produced by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub text: String,
    pub model: String,
}

impl CompletionResponse {
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_message() {
        let msg = ChatMessage::tool_result("echo", "hi");
        assert_eq!(msg.role, Role::System);
        assert!(msg.is_tool_result());
        assert_eq!(msg.tool_name.as_deref(), Some("echo"));
        assert_eq!(msg.content, "hi");
    }

    #[test]
    fn test_plain_message_serialization_omits_tool_fields() {
        let json = serde_json::to_value(ChatMessage::user("hello")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("tool_result").is_none());
        assert!(json.get("tool_name").is_none());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new(vec![ChatMessage::user("q")])
            .with_system("be brief")
            .with_options(GenerationOptions {
                temperature: 0.2,
                max_output_tokens: 512,
            })
            .with_model("gemini-test");

        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert_eq!(request.options.temperature, 0.2);
        assert_eq!(request.model.as_deref(), Some("gemini-test"));
        assert_eq!(request.last_message().unwrap().content, "q");
    }
}
