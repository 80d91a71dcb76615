//! Servers command - lists configured MCP servers.

use anyhow::Result;
use console::style;

use napier_agent::directive::NO_SERVERS;

use super::Context;

/// Run the servers command.
pub fn run(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let summaries = ctx.catalog(&loaded).summaries();

    if summaries.is_empty() {
        println!("{}", NO_SERVERS);
        return Ok(());
    }

    println!("{}", style("Configured MCP servers:").bold());
    for summary in &summaries {
        println!("{}", summary);
    }
    if let Some(default) = loaded.config.default_server() {
        println!();
        println!("Default: {}", default);
    }
    Ok(())
}
