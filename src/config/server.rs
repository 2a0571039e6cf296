//! Server tunables loading from config.toml
//!
//! Everything here has a sensible default, so the file is optional. Secrets
//! never live in this file; see [`super::settings`] for those.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: HttpSection,
    pub database: DatabaseSection,
    pub llm: LlmTuning,
    pub chat: ChatSection,
}

/// `[server]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    /// Socket address the HTTP server binds to
    pub bind_address: String,
    /// Allowed CORS origins; empty means any origin (the widget is embedded on merchant sites)
    pub cors_allowed_origins: Vec<String>,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Fixed pause between connection candidates
    pub connect_retry_delay_ms: u64,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            connect_retry_delay_ms: 500,
            connect_timeout_secs: 5,
        }
    }
}

/// `[llm]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTuning {
    /// Abort a chat completion after this many seconds
    pub timeout_secs: u64,
    /// Abort a model probe after this many seconds
    pub probe_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmTuning {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            probe_timeout_secs: 3,
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// `[chat]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    /// Number of prior messages sent to the LLM as context
    pub history_limit: u64,
    /// Length of the trial granted at registration
    pub trial_days: i64,
    pub max_message_chars: usize,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            history_limit: 10,
            trial_days: 14,
            max_message_chars: 2000,
        }
    }
}

/// Longest trial the server will grant
pub const MAX_TRIAL_DAYS: i64 = 3650;

impl ServerConfig {
    /// Rejects values that parse but cannot be served.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (
                "chat.trial_days",
                (1..=MAX_TRIAL_DAYS).contains(&self.chat.trial_days),
            ),
            ("chat.history_limit", self.chat.history_limit >= 1),
            ("chat.max_message_chars", self.chat.max_message_chars >= 1),
            ("llm.timeout_secs", self.llm.timeout_secs >= 1),
            ("llm.probe_timeout_secs", self.llm.probe_timeout_secs >= 1),
            ("database.connect_timeout_secs", self.database.connect_timeout_secs >= 1),
        ];

        match checks.iter().find(|(_, ok)| !ok) {
            Some((key, _)) => Err(Error::Config {
                message: format!("{key} is out of range"),
            }),
            None => Ok(()),
        }
    }
}

/// Loads server configuration from a TOML file
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML is invalid, or a
/// value is out of range.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServerConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

fn parse_config(contents: &str) -> Result<ServerConfig> {
    let config: ServerConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from `CONFIG_PATH` or ./config.toml, falling back to
/// defaults when the file does not exist.
pub fn load_default_config() -> Result<ServerConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        info!("Loading server configuration from {path}");
        load_config(path)
    } else {
        info!("No configuration file at {path}, using defaults");
        Ok(ServerConfig::default())
    }
}
