//! Configuration types mapping to `napier_config.json`.
//!
//! ```json
//! {
//!   "mcpServers": { "weather": { "command": "python", "args": ["weather.py"] } },
//!   "defaults": { "server": "weather" },
//!   "napier": { "model": "gemini-2.0-flash", "api_config": { "temperature": 0.2 } }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default model name.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default temperature for tool-aware prompts.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every section is optional so partial files (a project-local override,
/// say) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NapierConfig {
    /// Configured tool-providing servers, by name.
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerEntry>,

    /// Default selections.
    pub defaults: DefaultsSection,

    /// Model settings.
    pub napier: ModelSection,
}

impl NapierConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Servers merge by name; a later entry replaces an earlier one whole.
    pub fn merge(&mut self, other: NapierConfig) {
        self.mcp_servers.extend(other.mcp_servers);

        if other.defaults.server.is_some() {
            self.defaults.server = other.defaults.server;
        }

        self.napier.merge(other.napier);
    }

    /// Look up a server entry by name.
    pub fn server(&self, name: &str) -> Result<&McpServerEntry> {
        self.mcp_servers
            .get(name)
            .ok_or_else(|| ConfigError::ServerNotFound(name.to_string()))
    }

    /// Name of the default server, if one is configured.
    pub fn default_server(&self) -> Option<&str> {
        self.defaults.server.as_deref()
    }

    /// Configured server names, sorted.
    pub fn server_names(&self) -> Vec<&str> {
        self.mcp_servers.keys().map(String::as_str).collect()
    }
}

/// The `defaults` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsSection {
    pub server: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Model Section
// ─────────────────────────────────────────────────────────────────────────────

/// The `napier` section: which model to use and how to sample it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub model: Option<String>,
    pub api_config: ApiConfig,
    /// Plaintext API key. Environment and `.env` take precedence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl ModelSection {
    fn merge(&mut self, other: ModelSection) {
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.api_config.temperature.is_some() {
            self.api_config.temperature = other.api_config.temperature;
        }
        if other.api_config.max_output_tokens.is_some() {
            self.api_config.max_output_tokens = other.api_config.max_output_tokens;
        }
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
    }

    /// Effective model name.
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Effective temperature for tool-aware prompts.
    pub fn temperature(&self) -> f32 {
        self.api_config.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    /// Effective output token cap.
    pub fn max_output_tokens(&self) -> u32 {
        self.api_config
            .max_output_tokens
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS)
    }

    /// Check if the config file carries a plaintext key.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// The `napier.api_config` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// MCP Servers
// ─────────────────────────────────────────────────────────────────────────────

/// One entry under `mcpServers`.
///
/// Either `command` (spawned, spoken to over stdio) or `url` (remote) must be
/// set. Values may hold `${NAME}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct McpServerEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Where a server entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerTarget<'a> {
    Command { command: &'a str, args: &'a [String] },
    Url(&'a str),
}

impl McpServerEntry {
    /// Create a command entry.
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Default::default()
        }
    }

    /// Create a URL entry.
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Validate and classify the entry.
    pub fn target(&self, name: &str) -> Result<ServerTarget<'_>> {
        match (self.command.as_deref(), self.url.as_deref()) {
            (Some(command), None) if !command.trim().is_empty() => Ok(ServerTarget::Command {
                command,
                args: &self.args,
            }),
            (None, Some(url)) if !url.trim().is_empty() => Ok(ServerTarget::Url(url)),
            (Some(_), Some(_)) => Err(ConfigError::InvalidServer {
                name: name.to_string(),
                reason: "set either 'command' or 'url', not both".to_string(),
            }),
            _ => Err(ConfigError::InvalidServer {
                name: name.to_string(),
                reason: "missing 'command' or 'url'".to_string(),
            }),
        }
    }

    /// One-line rendering, e.g. `python weather.py`.
    pub fn summary(&self) -> String {
        match (&self.command, &self.url) {
            (Some(command), _) if self.args.is_empty() => command.clone(),
            (Some(command), _) => format!("{} {}", command, self.args.join(" ")),
            (None, Some(url)) => url.clone(),
            (None, None) => "(unconfigured)".to_string(),
        }
    }
}
