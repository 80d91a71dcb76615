//! Secret resolution for API keys and `${NAME}` placeholders.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. `.env` file in the working directory
//! 3. Config file value (with warning)

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::{ConfigError, McpServerEntry, Result};

/// Environment variable holding the model API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default dotenv filename.
const DOTENV_FILE: &str = ".env";

/// Result of secret resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Process environment.
    EnvVar(String),
    /// A dotenv file.
    DotEnv(PathBuf),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::DotEnv(path) => write!(f, "dotenv file {}", path.display()),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

/// Looks secrets up in the environment, then a dotenv file.
///
/// The dotenv file is read once at construction. A missing file is not an
/// error.
#[derive(Debug, Clone, Default)]
pub struct SecretResolver {
    dotenv_path: Option<PathBuf>,
    dotenv: HashMap<String, String>,
}

impl SecretResolver {
    /// Resolver reading `./.env`.
    pub fn new() -> Self {
        Self::with_dotenv(Path::new(DOTENV_FILE))
    }

    /// Resolver reading a specific dotenv file.
    pub fn with_dotenv(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let dotenv = parse_dotenv(&contents);
                tracing::debug!(path = %path.display(), entries = dotenv.len(), "Loaded dotenv file");
                Self {
                    dotenv_path: Some(path.to_path_buf()),
                    dotenv,
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Resolver that only consults the process environment.
    pub fn env_only() -> Self {
        Self::default()
    }

    /// Look up `name`, falling back to `config_value`.
    pub fn resolve(&self, name: &str, config_value: Option<&str>) -> Option<ResolvedSecret> {
        if let Ok(value) = std::env::var(name)
            && !value.is_empty()
        {
            return Some(ResolvedSecret {
                value,
                source: SecretSource::EnvVar(name.to_string()),
            });
        }

        if let (Some(path), Some(value)) = (&self.dotenv_path, self.dotenv.get(name))
            && !value.is_empty()
        {
            return Some(ResolvedSecret {
                value: value.clone(),
                source: SecretSource::DotEnv(path.clone()),
            });
        }

        config_value
            .filter(|v| !v.is_empty())
            .map(|v| ResolvedSecret {
                value: v.to_string(),
                source: SecretSource::ConfigFile,
            })
    }

    /// Resolve the model API key.
    pub fn resolve_api_key(&self, config_value: Option<&str>) -> Option<ResolvedSecret> {
        self.resolve(API_KEY_ENV, config_value)
    }

    /// Substitute every `${NAME}` in `value`.
    ///
    /// `context` names the field in error messages. An unterminated `${` is
    /// kept literally.
    pub fn resolve_placeholders(&self, value: &str, context: &str) -> Result<String> {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };

            let name = &after[..end];
            let secret = self
                .resolve(name, None)
                .ok_or_else(|| ConfigError::MissingSecret {
                    name: name.to_string(),
                    context: context.to_string(),
                })?;
            out.push_str(&secret.value);
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }

    /// Return a copy of a server entry with every placeholder substituted.
    pub fn resolve_entry(&self, server: &str, entry: &McpServerEntry) -> Result<McpServerEntry> {
        let field = |f: &str| format!("mcpServers.{}.{}", server, f);

        let command = entry
            .command
            .as_deref()
            .map(|c| self.resolve_placeholders(c, &field("command")))
            .transpose()?;
        let url = entry
            .url
            .as_deref()
            .map(|u| self.resolve_placeholders(u, &field("url")))
            .transpose()?;
        let args = entry
            .args
            .iter()
            .map(|a| self.resolve_placeholders(a, &field("args")))
            .collect::<Result<Vec<_>>>()?;
        let env: BTreeMap<String, String> = entry
            .env
            .iter()
            .map(|(k, v)| {
                Ok((
                    k.clone(),
                    self.resolve_placeholders(v, &field(&format!("env.{}", k)))?,
                ))
            })
            .collect::<Result<_>>()?;
        let headers: BTreeMap<String, String> = entry
            .headers
            .iter()
            .map(|(k, v)| {
                Ok((
                    k.clone(),
                    self.resolve_placeholders(v, &field(&format!("headers.{}", k)))?,
                ))
            })
            .collect::<Result<_>>()?;

        Ok(McpServerEntry {
            command,
            args,
            env,
            url,
            headers,
        })
    }
}

/// Parse `KEY=VALUE` lines. Blank lines, `#` comments and an `export `
/// prefix are accepted; matching surrounding quotes are stripped.
fn parse_dotenv(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
