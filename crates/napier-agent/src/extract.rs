//! Tool-call extraction from model text.
//!
//! The model is asked to request tools by emitting fenced blocks:
//!
//! ````text
//! ```json
//! {"tool_name": "echo", "parameters": {"text": "hi"}}
//! ```
//! ````

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use napier_mcp::ToolInvocationRequest;

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*(\{[^`]*\})\s*```").expect("static pattern"));

/// Model text together with the tool requests found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// The full text, unmodified.
    pub text: String,
    /// Accepted requests in order of appearance.
    pub requests: Vec<ToolInvocationRequest>,
}

impl Extraction {
    pub fn has_requests(&self) -> bool {
        !self.requests.is_empty()
    }
}

/// Scan `text` for ```` ```json ```` blocks describing tool calls.
///
/// Malformed blocks are skipped individually.
pub fn extract_tool_calls(text: &str) -> Extraction {
    let requests = JSON_BLOCK
        .captures_iter(text)
        .enumerate()
        .filter_map(|(index, caps)| {
            let body = caps.get(1)?.as_str();
            match parse_block(body) {
                Ok(request) => Some(request),
                Err(reason) => {
                    tracing::debug!(block = index, reason, "Skipping tool-call block");
                    None
                }
            }
        })
        .collect();

    Extraction {
        text: text.to_string(),
        requests,
    }
}

fn parse_block(body: &str) -> Result<ToolInvocationRequest, &'static str> {
    let value: Value = serde_json::from_str(body).map_err(|_| "invalid JSON")?;
    let Value::Object(mut obj) = value else {
        return Err("not a JSON object");
    };
    let Some(Value::String(tool_name)) = obj.remove("tool_name") else {
        return Err("missing string 'tool_name'");
    };
    let Some(Value::Object(parameters)) = obj.remove("parameters") else {
        return Err("missing object 'parameters'");
    };
    Ok(ToolInvocationRequest::new(tool_name, parameters))
}
