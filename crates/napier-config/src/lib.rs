//! Configuration system for Napier.
//!
//! Provides JSON (or TOML) configuration with:
//! - Named tool servers under `mcpServers` (command + args, or url)
//! - A default server selection
//! - Model name and sampling settings under `napier`
//! - Config file layering (user config + project-local overrides)
//! - Secret resolution (env var → `.env` → config file) and `${NAME}` placeholders

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    CONFIG_FILE, ConfigSource, LoadedConfig, config_dir, load_config, load_config_file,
    load_config_with_options, load_explicit, log_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{API_KEY_ENV, ResolvedSecret, SecretResolver, SecretSource};
pub use types::*;
