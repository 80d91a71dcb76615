//! CLI command handlers.

pub mod chat;
pub mod repl;
pub mod serve;
pub mod servers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use napier_agent::{AgentConfig, ServerCatalog};
use napier_config::{API_KEY_ENV, LoadedConfig, SecretResolver};
use napier_llm::{GeminiBackend, GeminiConfig, SharedBackend};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, replacing discovery.
    pub config_path: Option<PathBuf>,
    /// Model override.
    pub model: Option<String>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load configuration and print any warnings.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = match &self.config_path {
            Some(path) => napier_config::load_explicit(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => napier_config::load_config(None)?,
        };

        for warning in &loaded.warnings {
            eprintln!("warning: {}", warning);
        }
        for path in loaded.loaded_from() {
            tracing::debug!(path = %path.display(), "Using config file");
        }

        Ok(loaded)
    }

    /// Effective model name.
    pub fn model<'a>(&'a self, loaded: &'a LoadedConfig) -> &'a str {
        self.model
            .as_deref()
            .unwrap_or_else(|| loaded.config.napier.model())
    }

    /// Orchestrator settings from config and flags.
    pub fn agent_config(&self, loaded: &LoadedConfig) -> AgentConfig {
        let napier = &loaded.config.napier;
        AgentConfig::default()
            .with_model(self.model(loaded))
            .with_tool_temperature(napier.temperature())
            .with_max_output_tokens(napier.max_output_tokens())
    }

    /// Server catalog with secrets from the environment and `./.env`.
    pub fn catalog(&self, loaded: &LoadedConfig) -> ServerCatalog {
        ServerCatalog::new(loaded.config.clone(), SecretResolver::new())
    }

    /// Build the Gemini backend, resolving the API key.
    pub fn backend(&self, loaded: &LoadedConfig) -> Result<SharedBackend> {
        let secret = SecretResolver::new()
            .resolve_api_key(loaded.config.napier.api_key.as_deref())
            .with_context(|| {
                format!(
                    "{} is not set. Export it or add it to a .env file",
                    API_KEY_ENV
                )
            })?;
        tracing::debug!(source = %secret.source, "Resolved API key");

        let config = GeminiConfig::new(secret.value).with_model(self.model(loaded));
        let backend = GeminiBackend::new(config).context("Failed to create Gemini backend")?;
        Ok(Arc::new(backend))
    }
}
