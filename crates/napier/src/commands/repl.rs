//! REPL (Read-Eval-Print Loop) implementation for interactive chat.

use std::time::Duration;

use anyhow::Result;
use console::{Style, style};
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

use napier_agent::{
    Conversation, Directive, DirectiveOutcome, HELP_TEXT, Orchestrator, ProgressStage,
    RelayEvent, ServerCatalog, TurnRelay, execute, parse_input,
};
use napier_mcp::{Session, SessionManager, ToolDescriptor};

/// REPL state: one client context.
pub struct Repl {
    orchestrator: Orchestrator,
    servers: ServerCatalog,
    sessions: SessionManager,
    conversation: Conversation,
    editor: Editor<(), DefaultHistory>,
    verbose: bool,
}

impl Repl {
    /// Create a new REPL instance.
    pub fn new(orchestrator: Orchestrator, servers: ServerCatalog, verbose: bool) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(true)
            .build();

        let editor = Editor::with_config(config)?;

        Ok(Self {
            orchestrator,
            servers,
            sessions: SessionManager::default(),
            conversation: Conversation::new(),
            editor,
            verbose,
        })
    }

    /// Run the REPL loop, optionally running one directive first.
    pub async fn run(&mut self, startup: Option<Directive>) -> Result<()> {
        self.print_welcome();

        if let Some(directive) = startup {
            self.dispatch(directive).await;
        }

        loop {
            let prompt = self.format_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if let ControlFlow::Exit = self.handle_line(line).await {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!();
                    print_dim("(Interrupted - type /exit to quit)");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    break;
                }
                Err(e) => {
                    print_error(&format!("Input error: {}", e));
                    break;
                }
            }
        }

        self.sessions.disconnect().await;
        print_dim("Goodbye!");
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> ControlFlow {
        let parsed = parse_input(line);
        match Directive::from_input(&parsed) {
            Some(directive) => self.dispatch(directive).await,
            None => {
                self.run_turn(line).await;
                ControlFlow::Continue
            }
        }
    }

    /// Execute a directive and render its outcome.
    async fn dispatch(&mut self, directive: Directive) -> ControlFlow {
        if directive == Directive::Exit {
            return ControlFlow::Exit;
        }

        let connecting = matches!(
            directive,
            Directive::Connect { .. } | Directive::ConnectServer { .. }
        );
        let spinner = connecting.then(|| spinner("Connecting..."));
        let result = execute(directive, &self.sessions, &self.servers).await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match result {
            Ok(DirectiveOutcome::Query(query)) => self.run_turn(&query).await,
            Ok(DirectiveOutcome::Exit) => return ControlFlow::Exit,
            Ok(outcome) => self.render_outcome(outcome),
            Err(e) => print_error(&e.to_string()),
        }
        ControlFlow::Continue
    }

    fn render_outcome(&self, outcome: DirectiveOutcome) {
        match outcome {
            DirectiveOutcome::Connected(session) => print_connected(&session),
            DirectiveOutcome::Disconnected => print_dim("Disconnected from MCP server"),
            DirectiveOutcome::Servers(servers) => {
                println!("{}", style("Configured MCP servers:").bold());
                for server in servers {
                    println!("{}", server);
                }
            }
            DirectiveOutcome::Tools(tools) => print_tools(&tools),
            DirectiveOutcome::Help => println!("{}", HELP_TEXT),
            DirectiveOutcome::Notice(message) => println!("{}", message),
            DirectiveOutcome::Query(_) | DirectiveOutcome::Exit => {}
        }
    }

    /// Run one turn, rendering events as they arrive. Ctrl+C abandons it.
    async fn run_turn(&mut self, query: &str) {
        let (relay, mut events) = TurnRelay::start(query);
        let spinner = spinner("Thinking...");
        let verbose = self.verbose;

        let turn = self.orchestrator.run_turn(
            &mut self.conversation,
            &self.sessions,
            query,
            relay,
        );
        let render = async {
            while let Some(event) = events.recv().await {
                spinner.suspend(|| print_event(&event, verbose));
            }
        };

        tokio::select! {
            _ = async { tokio::join!(turn, render) } => {}
            _ = tokio::signal::ctrl_c() => {
                spinner.suspend(|| print_dim("(Turn interrupted)"));
            }
        }
        spinner.finish_and_clear();
    }

    fn print_welcome(&self) {
        let dim = Style::new().dim();
        println!();
        println!("{}", style("Napier MCP Client").bold().cyan());
        println!("{}", dim.apply_to("─".repeat(40)));
        println!("{}", dim.apply_to(format!("Model: {}", self.orchestrator.backend_name())));
        println!(
            "{}",
            dim.apply_to("Type your query, or /help for commands. Ctrl+D to exit.")
        );
        println!();
    }

    fn format_prompt(&self) -> String {
        let label = match self.sessions.server_name() {
            Some(server) => format!("Napier ({}) >", server),
            None => "Napier >".to_string(),
        };
        format!("{} ", style(label).cyan().bold())
    }
}

/// Control flow for the REPL.
pub enum ControlFlow {
    Continue,
    Exit,
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_event(event: &RelayEvent, verbose: bool) {
    match event {
        RelayEvent::Ack { query, .. } => {
            if verbose {
                print_dim(&format!("[Processing: {}]", query));
            }
        }
        RelayEvent::Progress {
            stage: ProgressStage::ToolResult,
            text,
            tool,
            ..
        } => {
            print_dim(&format!(
                "[Tool Result: {}]",
                tool.as_deref().unwrap_or("unknown")
            ));
            println!("{}", text);
        }
        RelayEvent::Progress { text, .. } => {
            println!();
            println!("{}", text);
            println!();
        }
        RelayEvent::Success { .. } => {}
        RelayEvent::Error { message, .. } => print_error(message),
    }
}

fn print_connected(session: &Session) {
    let green = Style::new().green();
    println!(
        "{} Connected to '{}' via {}",
        green.apply_to("✓"),
        session.server,
        session.transport
    );
    print_tools(&session.tools);
}

fn print_tools(tools: &[ToolDescriptor]) {
    if tools.is_empty() {
        print_dim("No tools available");
        return;
    }
    println!("{}", style("Available tools:").bold());
    for tool in tools {
        println!("• {}: {}", style(&tool.name).cyan(), tool.description);
    }
}

fn print_dim(msg: &str) {
    let dim = Style::new().dim();
    println!("{}", dim.apply_to(msg));
}

fn print_error(msg: &str) {
    let red = Style::new().red();
    println!("{} {}", red.apply_to("Error:"), msg);
}
