//! Prompt text for the orchestration loop.

use napier_mcp::ToolDescriptor;

/// Preamble for plain chat, used when no tools are available.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant in the Napier terminal application.
You can help users with various tasks and answer questions.
When you're connected to MCP servers, you can use tools to interact with third-party applications.
Be concise, helpful, and friendly in your responses.";

const TOOL_PREAMBLE: &str =
    "You are an AI assistant that helps users interact with various applications through tools.";

const TOOL_INSTRUCTIONS: &str = r#"INSTRUCTIONS:
1. Analyze the user's request carefully.
2. If a tool is needed to fulfill the request, decide which tool to use.
3. Format your tool calls as JSON, wrapped in triple backticks with the 'json' tag.
4. Example tool call format:
```json
{
  "tool_name": "tool_name_here",
  "parameters": {
    "param1": "value1",
    "param2": "value2"
  }
}
```
5. After receiving tool results, provide a helpful response that incorporates the information.
6. If no tool is needed, respond directly to the user's request.

Always make sure to follow the exact input schema for each tool when making a call."#;

/// Render the catalog as a bullet list with typed parameters.
pub fn format_tool_catalog(tools: &[ToolDescriptor]) -> String {
    let mut out = String::from("You have access to the following tools:\n");

    for tool in tools {
        out.push_str("\n- ");
        out.push_str(&tool.name);
        if !tool.description.is_empty() {
            out.push_str(": ");
            out.push_str(&tool.description);
        }
        out.push('\n');

        let params = tool.parameters();
        if params.is_empty() {
            out.push_str("  Parameters: none\n");
            continue;
        }
        out.push_str("  Parameters:\n");
        for p in params {
            let flag = if p.required { "required" } else { "optional" };
            out.push_str(&format!("    - {} ({}, {})", p.name, p.kind, flag));
            if !p.description.is_empty() {
                out.push_str(": ");
                out.push_str(&p.description);
            }
            out.push('\n');
        }
    }
    out
}

/// System instruction for a tool-aware turn.
pub fn tool_system_prompt(tools: &[ToolDescriptor]) -> String {
    format!(
        "{}\n\n{}\n{}",
        TOOL_PREAMBLE,
        format_tool_catalog(tools),
        TOOL_INSTRUCTIONS
    )
}

/// Transient user directive asking the model to interpret a tool result.
pub fn follow_up_prompt(tool_name: &str, content: &str) -> String {
    format!(
        "The tool '{}' returned the following result:\n\n{}\n\n\
         Please analyze this result and provide a helpful response to the user based on this information.\n\
         Keep your response focused on the insights from the tool result.",
        tool_name, content
    )
}

/// Query text for `/use <tool> <request>`.
pub fn use_query(tool: &str, request: &str) -> String {
    format!("I want to use the '{}' tool to {}", tool, request)
}
