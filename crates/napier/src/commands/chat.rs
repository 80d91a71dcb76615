//! Chat command - interactive REPL mode.

use anyhow::Result;
use clap::Args;

use napier_agent::{Directive, Orchestrator};

use super::Context;
use super::repl::Repl;

/// Arguments for the chat command.
#[derive(Args, Debug, Default)]
pub struct ChatArgs {
    /// Server script (.py or .js) to connect to at start-up
    pub script: Option<String>,

    /// Configured server to connect to at start-up
    #[arg(short, long, env = "NAPIER_SERVER", conflicts_with = "script")]
    pub server: Option<String>,
}

impl ChatArgs {
    /// Directive to run before the first prompt.
    fn startup_directive(self) -> Option<Directive> {
        match (self.script, self.server) {
            (Some(script), _) => Some(Directive::Connect { script }),
            (None, Some(name)) => Some(Directive::ConnectServer { name }),
            (None, None) => None,
        }
    }
}

/// Run the chat command (REPL).
pub async fn run(args: ChatArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let backend = ctx.backend(&loaded)?;
    let orchestrator = Orchestrator::new(backend, ctx.agent_config(&loaded));

    let mut repl = Repl::new(orchestrator, ctx.catalog(&loaded), ctx.verbose)?;
    repl.run(args.startup_directive()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_directive() {
        let args = ChatArgs {
            script: Some("weather.py".into()),
            server: None,
        };
        assert_eq!(
            args.startup_directive(),
            Some(Directive::Connect {
                script: "weather.py".into()
            })
        );

        let args = ChatArgs {
            script: None,
            server: Some("files".into()),
        };
        assert_eq!(
            args.startup_directive(),
            Some(Directive::ConnectServer {
                name: "files".into()
            })
        );

        assert_eq!(ChatArgs::default().startup_directive(), None);
    }
}
