//! Configuration loading, validation, and management for haksa.
//!
//! Loads configuration from `~/.haksa/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.haksa/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Gateway (HTTP listener) configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session store configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Answer generation configuration
    #[serde(default)]
    pub generator: GeneratorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            session: SessionConfig::default(),
            retrieval: RetrievalConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("gateway", &self.gateway)
            .field("session", &self.session)
            .field("retrieval", &self.retrieval)
            .field("generator", &self.generator)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session store backend: "memory" or "sqlite"
    #[serde(default = "default_session_backend")]
    pub backend: String,

    /// Path to the SQLite database file (sqlite backend only)
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,

    /// Sessions idle longer than this are evicted
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,

    /// How many turns (user+assistant pairs) of history to keep per turn
    /// when assembling composer context
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// How often the background sweep evicts expired sessions, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_session_backend() -> String {
    "memory".into()
}
fn default_sqlite_path() -> String {
    "haksa_sessions.db".into()
}
fn default_ttl_hours() -> u32 {
    24
}
fn default_history_window() -> usize {
    10
}
fn default_sweep_interval() -> u64 {
    3600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            sqlite_path: default_sqlite_path(),
            ttl_hours: default_ttl_hours(),
            history_window: default_history_window(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Knowledge index backend: "memory" or "rest"
    #[serde(default = "default_index_backend")]
    pub index: String,

    /// Path to a JSON snippet file used to seed the in-memory index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_path: Option<String>,

    /// RPC endpoint for the REST index backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// How many sources to fetch for curriculum queries
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// How many sources to fetch for hybrid queries
    #[serde(default = "default_hybrid_top_k")]
    pub hybrid_top_k: usize,
}

fn default_index_backend() -> String {
    "memory".into()
}
fn default_top_k() -> usize {
    3
}
fn default_hybrid_top_k() -> usize {
    2
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            index: default_index_backend(),
            knowledge_path: None,
            endpoint: None,
            top_k: default_top_k(),
            hybrid_top_k: default_hybrid_top_k(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Generation backend: "template" or "openai"
    #[serde(default = "default_generator_backend")]
    pub backend: String,

    /// Model name for the OpenAI-compatible backend
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// API key (can also come from the OPENAI_API_KEY environment variable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per generated answer
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_generator_backend() -> String {
    "template".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    500
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            backend: default_generator_backend(),
            model: default_model(),
            api_url: default_api_url(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl std::fmt::Debug for GeneratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.haksa/config.toml).
    ///
    /// Environment variable overrides:
    /// - `OPENAI_API_KEY` — generator API key
    /// - `HAKSA_PORT` — gateway port
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.generator.api_key.is_none() {
            config.generator.api_key = std::env::var("OPENAI_API_KEY").ok();
        }

        if let Ok(port) = std::env::var("HAKSA_PORT") {
            config.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("HAKSA_PORT is not a valid port: {port}"))
            })?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".haksa")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.generator.temperature) {
            return Err(ConfigError::ValidationError(
                "generator.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.session.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "session.history_window must be at least 1 turn".into(),
            ));
        }

        if self.retrieval.top_k == 0 || self.retrieval.hybrid_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval top_k values must be at least 1".into(),
            ));
        }

        match self.session.backend.as_str() {
            "memory" | "sqlite" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown session backend '{other}' (expected 'memory' or 'sqlite')"
                )));
            }
        }

        match self.retrieval.index.as_str() {
            "memory" => {}
            "rest" if self.retrieval.endpoint.is_some() => {}
            "rest" => {
                return Err(ConfigError::ValidationError(
                    "retrieval.endpoint is required for the 'rest' index".into(),
                ));
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown retrieval index '{other}' (expected 'memory' or 'rest')"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
