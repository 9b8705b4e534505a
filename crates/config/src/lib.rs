//! Configuration loading, validation, and management for Helmsman.
//!
//! Loads configuration from `~/.helmsman/config.toml` (or the path in
//! `HELMSMAN_CONFIG`) with environment variable overrides. Validates all
//! settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The root configuration structure.
///
/// Maps directly to `~/.helmsman/config.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Model transport settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Result summarization settings
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

/// Settings for the model transport.
#[derive(Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_model")]
    pub model: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Settings for the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum plan/act/observe iterations per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// A text-only answer shorter than this many characters is treated
    /// as a terminal answer
    #[serde(default = "default_short_answer_limit")]
    pub short_answer_limit: usize,

    /// Whether to request a thinking trace from the model
    #[serde(default = "default_thinking")]
    pub thinking: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            short_answer_limit: default_short_answer_limit(),
            thinking: default_thinking(),
        }
    }
}

/// Settings for tool-result summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Text results longer than this many characters are digested down
    /// to a length notice
    #[serde(default = "default_long_text_limit")]
    pub long_text_limit: usize,

    /// Maximum itemized entries in a results-list digest
    #[serde(default = "default_max_listed_results")]
    pub max_listed_results: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            long_text_limit: default_long_text_limit(),
            max_listed_results: default_max_listed_results(),
        }
    }
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_max_iterations() -> u32 {
    10
}
fn default_short_answer_limit() -> usize {
    200
}
fn default_thinking() -> bool {
    true
}
fn default_long_text_limit() -> usize {
    500
}
fn default_max_listed_results() -> usize {
    3
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field(
                "api_key",
                &match self.api_key {
                    Some(_) => "[REDACTED]",
                    None => "None",
                },
            )
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("transport", &self.transport)
            .field("agent", &self.agent)
            .field("summarizer", &self.summarizer)
            .finish()
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// The config directory: `~/.helmsman`.
    pub fn config_dir() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".helmsman")
    }

    /// The config file path: `$HELMSMAN_CONFIG` or `~/.helmsman/config.toml`.
    pub fn config_path() -> PathBuf {
        std::env::var_os("HELMSMAN_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| Self::config_dir().join("config.toml"))
    }

    /// Load configuration from the default path with env overrides.
    ///
    /// A missing config file is not an error — defaults apply.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        let mut config = if path.is_file() {
            Self::load_from(&path)?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file. No env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply environment variable overrides via the given lookup.
    ///
    /// Recognized: `HELMSMAN_API_KEY`, `OPENROUTER_API_KEY`,
    /// `OPENAI_API_KEY`, `HELMSMAN_MODEL`, `HELMSMAN_BASE_URL`.
    pub fn apply_env_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        for key in ["HELMSMAN_API_KEY", "OPENROUTER_API_KEY", "OPENAI_API_KEY"] {
            if self.transport.api_key.is_none() {
                if let Some(value) = get(key) {
                    self.transport.api_key = Some(value);
                }
            }
        }
        if let Some(model) = get("HELMSMAN_MODEL") {
            self.transport.model = model;
        }
        if let Some(base_url) = get("HELMSMAN_BASE_URL") {
            self.transport.base_url = base_url;
        }
    }

    /// Validate all settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("transport.base_url is empty".into()));
        }
        if self.transport.model.trim().is_empty() {
            return Err(ConfigError::Invalid("transport.model is empty".into()));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.summarizer.long_text_limit == 0 {
            return Err(ConfigError::Invalid(
                "summarizer.long_text_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
