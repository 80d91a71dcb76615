//! Control directives shared by the REPL and the WebSocket surface.

use napier_mcp::{Session, SessionManager, ToolDescriptor};

use crate::command::ParsedInput;
use crate::error::Result;
use crate::prompt::use_query;
use crate::servers::{ServerCatalog, ServerSummary};

/// Help text listing every directive.
pub const HELP_TEXT: &str = "Available commands:
• '/connect <path_to_server>' - Connect to an MCP server script (.py or .js)
• '/connect-server <server_name>' - Connect to a configured MCP server
• '/disconnect' - Disconnect from the current server
• '/servers' - List configured MCP servers
• '/tools' - List available MCP tools
• '/use <tool_name> <request>' - Ask Napier to use a specific tool
• '/help' - Display this help message
• '/exit' or '/quit' - Exit the application

Chat directly with Napier or use MCP tools when connected.";

pub const UNKNOWN_COMMAND: &str = "Unknown command. Type '/help' for assistance.";
pub const NOT_CONNECTED: &str =
    "Not connected to any MCP server. Use '/connect <path_to_server>' first.";
pub const MISSING_USE_REQUEST: &str = "Please provide a query to use with the tool.";
pub const NO_SERVERS: &str = "No MCP servers configured. Add servers to napier_config.json.";

/// A recognised directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Connect { script: String },
    ConnectServer { name: String },
    Disconnect,
    Servers,
    Tools,
    Use { tool: String, request: Option<String> },
    Help,
    Exit,
    Unknown,
}

impl Directive {
    /// Map a directive name and its arguments to a [`Directive`].
    ///
    /// Directives missing a required first argument are `Unknown`.
    pub fn recognize(name: &str, args: &[String]) -> Self {
        let joined = || args.join(" ");
        match (name, args) {
            ("connect", [_, ..]) => Self::Connect { script: joined() },
            ("connect-server", [_, ..]) => Self::ConnectServer { name: joined() },
            ("disconnect", _) => Self::Disconnect,
            ("servers", _) => Self::Servers,
            ("tools", _) => Self::Tools,
            ("use", [tool, rest @ ..]) => Self::Use {
                tool: tool.clone(),
                request: (!rest.is_empty()).then(|| rest.join(" ")),
            },
            ("help", _) => Self::Help,
            ("exit" | "quit", _) => Self::Exit,
            _ => Self::Unknown,
        }
    }

    /// Recognise parsed input; `None` for plain text.
    pub fn from_input(input: &ParsedInput) -> Option<Self> {
        match input {
            ParsedInput::Directive { name, args } => Some(Self::recognize(name, args)),
            ParsedInput::Text(_) => None,
        }
    }
}

/// What running a directive produced, for the surface to render.
#[derive(Debug, Clone)]
pub enum DirectiveOutcome {
    Connected(Session),
    Disconnected,
    Servers(Vec<ServerSummary>),
    Tools(Vec<ToolDescriptor>),
    Help,
    /// Run this text as a normal turn.
    Query(String),
    Exit,
    /// Message for the operator, no state changed.
    Notice(String),
}

/// Execute a directive against a context's session.
///
/// Connection failures are returned as errors; usage problems come back as
/// [`DirectiveOutcome::Notice`].
pub async fn execute(
    directive: Directive,
    sessions: &SessionManager,
    servers: &ServerCatalog,
) -> Result<DirectiveOutcome> {
    let outcome = match directive {
        Directive::Connect { script } => {
            let descriptor = ServerCatalog::script_descriptor(&script)?;
            DirectiveOutcome::Connected(sessions.connect(&descriptor).await?)
        }
        Directive::ConnectServer { name } => {
            let descriptor = servers.descriptor(&name)?;
            DirectiveOutcome::Connected(sessions.connect(&descriptor).await?)
        }
        Directive::Disconnect => {
            sessions.disconnect().await;
            DirectiveOutcome::Disconnected
        }
        Directive::Servers => {
            let summaries = servers.summaries();
            if summaries.is_empty() {
                DirectiveOutcome::Notice(NO_SERVERS.to_string())
            } else {
                DirectiveOutcome::Servers(summaries)
            }
        }
        Directive::Tools if !sessions.is_connected() => {
            DirectiveOutcome::Notice(NOT_CONNECTED.to_string())
        }
        Directive::Tools => DirectiveOutcome::Tools(sessions.list_tools().await?),
        Directive::Use { .. } if !sessions.is_connected() => {
            DirectiveOutcome::Notice(NOT_CONNECTED.to_string())
        }
        Directive::Use {
            tool,
            request: Some(request),
        } => DirectiveOutcome::Query(use_query(&tool, &request)),
        Directive::Use { request: None, .. } => {
            DirectiveOutcome::Notice(MISSING_USE_REQUEST.to_string())
        }
        Directive::Help => DirectiveOutcome::Help,
        Directive::Exit => DirectiveOutcome::Exit,
        Directive::Unknown => DirectiveOutcome::Notice(UNKNOWN_COMMAND.to_string()),
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse_input;
    use crate::error::AgentError;

    fn recognize(input: &str) -> Directive {
        Directive::from_input(&parse_input(input)).unwrap()
    }

    #[test]
    fn test_recognize() {
        assert_eq!(
            recognize("/connect ./weather.py"),
            Directive::Connect {
                script: "./weather.py".into()
            }
        );
        assert_eq!(
            recognize("/Connect-Server weather"),
            Directive::ConnectServer {
                name: "weather".into()
            }
        );
        assert_eq!(recognize("/QUIT"), Directive::Exit);
        assert_eq!(recognize("/exit"), Directive::Exit);
        assert_eq!(recognize("/tools"), Directive::Tools);
        assert_eq!(
            recognize("/use echo repeat hello"),
            Directive::Use {
                tool: "echo".into(),
                request: Some("repeat hello".into())
            }
        );
        assert_eq!(
            recognize("/use echo"),
            Directive::Use {
                tool: "echo".into(),
                request: None
            }
        );
        assert_eq!(recognize("/use"), Directive::Unknown);
        assert_eq!(recognize("/connect"), Directive::Unknown);
        assert_eq!(recognize("/frobnicate"), Directive::Unknown);
        assert!(Directive::from_input(&parse_input("hello")).is_none());
    }

    #[tokio::test]
    async fn test_execute_without_session() {
        let sessions = SessionManager::default();
        let servers = ServerCatalog::default();

        let notice = |outcome: DirectiveOutcome| match outcome {
            DirectiveOutcome::Notice(text) => text,
            other => panic!("expected notice, got {:?}", other),
        };

        let out = execute(Directive::Tools, &sessions, &servers).await.unwrap();
        assert_eq!(notice(out), NOT_CONNECTED);

        let use_it = Directive::Use {
            tool: "echo".into(),
            request: Some("say hi".into()),
        };
        let out = execute(use_it, &sessions, &servers).await.unwrap();
        assert_eq!(notice(out), NOT_CONNECTED);

        let out = execute(Directive::Servers, &sessions, &servers).await.unwrap();
        assert_eq!(notice(out), NO_SERVERS);

        let out = execute(Directive::Unknown, &sessions, &servers).await.unwrap();
        assert_eq!(notice(out), UNKNOWN_COMMAND);

        let out = execute(Directive::Disconnect, &sessions, &servers).await.unwrap();
        assert!(matches!(out, DirectiveOutcome::Disconnected));
    }

    #[tokio::test]
    async fn test_execute_connect_errors() {
        let sessions = SessionManager::default();
        let servers = ServerCatalog::default();

        let err = execute(
            Directive::Connect {
                script: "server.rb".into(),
            },
            &sessions,
            &servers,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedScript(_)));

        let err = execute(
            Directive::ConnectServer {
                name: "missing".into(),
            },
            &sessions,
            &servers,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
        assert!(!sessions.is_connected());
    }
}
