//! Napier - MCP tool-orchestration client
//!
//! Main entry point for the Napier CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{chat, serve, servers};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Napier - chat with a language model that can call MCP tools
#[derive(Parser)]
#[command(name = "napier")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (replaces napier_config.json discovery)
    #[arg(long, global = true, env = "NAPIER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(long, global = true, env = "NAPIER_MODEL")]
    pub model: Option<String>,

    /// Arguments for the default chat command
    #[command(flatten)]
    pub chat: chat::ChatArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enter interactive chat mode (REPL, the default)
    Chat(chat::ChatArgs),

    /// Serve the WebSocket interface
    Serve(serve::ServeArgs),

    /// List configured MCP servers
    Servers,
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Console (human-readable, stderr) + rotating JSON file
    let filter = if cli.verbose {
        "napier=debug,napier_mcp=debug,napier_agent=debug,napier_llm=debug,napier_server=debug,napier_config=debug,info"
    } else {
        "napier=info,napier_mcp=info,napier_agent=info,napier_llm=info,napier_server=info,napier_config=info,warn"
    };

    let log_dir = napier_config::log_dir().unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "napier.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "napier=trace,napier_mcp=trace,napier_agent=trace,napier_llm=trace,napier_server=trace,napier_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_path: cli.config,
        model: cli.model,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Chat(args)) => chat::run(args, &ctx).await,
        Some(Commands::Serve(args)) => serve::run(args, &ctx).await,
        Some(Commands::Servers) => servers::run(&ctx),
        None => chat::run(cli.chat, &ctx).await,
    }
}
