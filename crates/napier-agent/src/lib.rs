//! Orchestration core for Napier.
//!
//! Ties a [`SessionManager`](napier_mcp::SessionManager) and a model backend
//! together:
//!
//! - [`command`] classifies input as a directive or free text
//! - [`directive`] runs `/connect`, `/tools`, `/use` and friends
//! - [`extract`] pulls ```` ```json ```` tool calls out of model replies
//! - [`orchestrator`] runs a turn and folds tool results back in
//! - [`relay`] streams the turn's progress to one observer

pub mod command;
pub mod directive;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod prompt;
pub mod relay;
pub mod servers;
pub mod tools;

pub use command::{ParsedInput, parse_input};
pub use directive::{Directive, DirectiveOutcome, HELP_TEXT, execute};
pub use error::{AgentError, Result};
pub use extract::{Extraction, extract_tool_calls};
pub use orchestrator::{AgentConfig, Conversation, Orchestrator, TurnSummary};
pub use relay::{ProgressStage, RelayEvent, RelayReceiver, TurnRelay};
pub use servers::{ServerCatalog, ServerSummary};
pub use tools::{NoTools, ToolProvider};
