//! Tool invocation requests and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::CallToolResult;

/// A request to run one tool, usually extracted from model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ToolInvocationRequest {
    pub fn new(tool_name: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters,
        }
    }
}

/// Outcome status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationStatus {
    Success,
    Error,
}

/// Text returned by a tool, tagged with success or error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocationResult {
    pub content: String,
    pub status: InvocationStatus,
}

impl ToolInvocationResult {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: InvocationStatus::Success,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: InvocationStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == InvocationStatus::Error
    }
}

impl From<CallToolResult> for ToolInvocationResult {
    fn from(result: CallToolResult) -> Self {
        let content = result.text();
        if result.is_error() {
            Self::error(content)
        } else {
            Self::success(content)
        }
    }
}
