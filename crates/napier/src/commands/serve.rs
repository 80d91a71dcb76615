//! Serve command - runs the WebSocket server.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use napier_server::{Server, ServerConfig};

use super::Context;

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(short, long, env = "NAPIER_BIND", default_value = napier_server::config::DEFAULT_BIND_ADDRESS)]
    pub bind: SocketAddr,

    /// Close connections idle for this many seconds
    #[arg(long)]
    pub idle_timeout: Option<u64>,

    /// Allowed CORS origin (repeatable, `*` for any)
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,
}

impl ServeArgs {
    fn server_config(&self) -> ServerConfig {
        let config = ServerConfig::new()
            .with_bind_address(self.bind)
            .with_cors_origins(self.cors_origins.clone());
        match self.idle_timeout {
            Some(secs) => config.with_idle_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let backend = ctx.backend(&loaded)?;

    let server = Server::new(
        backend,
        ctx.agent_config(&loaded),
        ctx.catalog(&loaded),
        args.server_config(),
    );

    println!("Napier listening on ws://{}/ws", server.bind_address());
    server.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_from_args() {
        let args = ServeArgs {
            bind: "0.0.0.0:9000".parse().unwrap(),
            idle_timeout: Some(30),
            cors_origins: vec!["*".into()],
        };
        let config = args.server_config();
        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.idle_timeout, Duration::from_secs(30));
        assert_eq!(config.cors_origins, vec!["*"]);
    }
}
