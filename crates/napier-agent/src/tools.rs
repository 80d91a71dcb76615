//! The seam between the orchestration loop and whatever executes tools.

use async_trait::async_trait;

use napier_mcp::{SessionManager, ToolDescriptor, ToolInvocationRequest, ToolInvocationResult};

/// Source of tools for a turn.
///
/// Failures are reported as error-status results so the loop can fold them
/// into the history like any other output.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Tools currently available. Empty when there is no session.
    async fn catalog(&self) -> Vec<ToolDescriptor>;

    /// Execute one request.
    async fn invoke(&self, request: &ToolInvocationRequest) -> ToolInvocationResult;
}

#[async_trait]
impl ToolProvider for SessionManager {
    async fn catalog(&self) -> Vec<ToolDescriptor> {
        if !self.is_connected() {
            return Vec::new();
        }
        match self.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list tools");
                Vec::new()
            }
        }
    }

    async fn invoke(&self, request: &ToolInvocationRequest) -> ToolInvocationResult {
        match SessionManager::invoke(self, &request.tool_name, request.parameters.clone()).await {
            Ok(result) => result,
            Err(e) => ToolInvocationResult::error(format!(
                "Error calling tool '{}': {}",
                request.tool_name, e
            )),
        }
    }
}

/// Provider with no tools, for plain chat.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTools;

#[async_trait]
impl ToolProvider for NoTools {
    async fn catalog(&self) -> Vec<ToolDescriptor> {
        Vec::new()
    }

    async fn invoke(&self, request: &ToolInvocationRequest) -> ToolInvocationResult {
        ToolInvocationResult::error(format!(
            "Error calling tool '{}': not connected to an MCP server",
            request.tool_name
        ))
    }
}
