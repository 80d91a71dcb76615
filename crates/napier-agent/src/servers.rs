//! Turning configured servers and ad-hoc scripts into descriptors.

use std::path::Path;

use napier_config::{NapierConfig, SecretResolver, ServerTarget};
use napier_mcp::ServerDescriptor;

use crate::error::{AgentError, Result};

/// One line of the `/servers` listing.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ServerSummary {
    pub name: String,
    /// Command line or URL.
    pub endpoint: String,
}

impl std::fmt::Display for ServerSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "• {}: {}", self.name, self.endpoint)
    }
}

/// Configured servers plus the secrets needed to launch them.
#[derive(Debug, Clone, Default)]
pub struct ServerCatalog {
    config: NapierConfig,
    secrets: SecretResolver,
}

impl ServerCatalog {
    pub fn new(config: NapierConfig, secrets: SecretResolver) -> Self {
        Self { config, secrets }
    }

    pub fn config(&self) -> &NapierConfig {
        &self.config
    }

    /// Configured servers, sorted by name.
    pub fn summaries(&self) -> Vec<ServerSummary> {
        self.config
            .mcp_servers
            .iter()
            .map(|(name, entry)| ServerSummary {
                name: name.clone(),
                endpoint: entry.summary(),
            })
            .collect()
    }

    /// Build the descriptor for a configured server, resolving placeholders.
    pub fn descriptor(&self, name: &str) -> Result<ServerDescriptor> {
        let entry = self.config.server(name)?;
        let resolved = self.secrets.resolve_entry(name, entry)?;

        let descriptor = match resolved.target(name)? {
            ServerTarget::Command { command, args } => {
                ServerDescriptor::new(name, command).with_args(args.iter().cloned())
            }
            ServerTarget::Url(url) => resolved
                .headers
                .iter()
                .fold(ServerDescriptor::url(name, url), |d, (k, v)| {
                    d.with_header(k.clone(), v.clone())
                }),
        };

        Ok(resolved
            .env
            .iter()
            .fold(descriptor, |d, (k, v)| d.with_env_var(k.clone(), v.clone())))
    }

    /// Descriptor for `name`, or for `defaults.server` when `name` is `None`.
    pub fn descriptor_or_default(&self, name: Option<&str>) -> Result<ServerDescriptor> {
        match name.or(self.config.default_server()) {
            Some(name) => self.descriptor(name),
            None => Err(AgentError::session(
                "no server given and no default server configured",
            )),
        }
    }

    /// Descriptor for a local server script: `.py` runs under `python`,
    /// `.js` under `node`.
    pub fn script_descriptor(path: &str) -> Result<ServerDescriptor> {
        let script = Path::new(path);
        let runner = match script.extension().and_then(|e| e.to_str()) {
            Some("py") => "python",
            Some("js") => "node",
            _ => return Err(AgentError::UnsupportedScript(path.to_string())),
        };
        let name = script
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path)
            .to_string();
        Ok(ServerDescriptor::new(name, runner).with_arg(path))
    }
}
