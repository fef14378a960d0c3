//! Configuration loading, validation, and management for causerie.
//!
//! Loads configuration from `~/.causerie/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.causerie/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language-model endpoint settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Semantic memory settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Context assembly budgets and persona
    #[serde(default)]
    pub context: ContextConfig,

    /// Web-search (evidence fetch) settings
    #[serde(default)]
    pub search: SearchConfig,
}

/// Language-model endpoint settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name to request
    #[serde(default = "default_model")]
    pub model: String,

    /// Optional bearer token for the endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "qwen2.5:3b-instruct".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Semantic memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Whether semantic memory participates in context assembly
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum number of entries kept in the store
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entry content is truncated to this many characters
    #[serde(default = "default_content_char_cap")]
    pub content_char_cap: usize,

    /// Embedding vector dimension
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
}

fn default_true() -> bool {
    true
}
fn default_capacity() -> usize {
    128
}
fn default_content_char_cap() -> usize {
    320
}
fn default_embedding_dimension() -> usize {
    256
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
            content_char_cap: default_content_char_cap(),
            embedding_dimension: default_embedding_dimension(),
        }
    }
}

/// Context assembly budgets and persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Aggregate prompt budget in estimated tokens
    #[serde(default = "default_total_tokens")]
    pub total_tokens: usize,

    /// Budget reserved for the system prompt
    #[serde(default = "default_system_tokens")]
    pub system_tokens: usize,

    /// History/memory budget for the planning prompt
    #[serde(default = "default_planning_tokens")]
    pub planning_tokens: usize,

    /// History/memory budget for the answer prompt
    #[serde(default = "default_answer_tokens")]
    pub answer_tokens: usize,

    /// How many contextual anchor keywords the profiler extracts
    #[serde(default = "default_anchor_count")]
    pub anchor_count: usize,

    /// Override the built-in persona text entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

fn default_total_tokens() -> usize {
    4096
}
fn default_system_tokens() -> usize {
    800
}
fn default_planning_tokens() -> usize {
    1200
}
fn default_answer_tokens() -> usize {
    2800
}
fn default_anchor_count() -> usize {
    6
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_total_tokens(),
            system_tokens: default_system_tokens(),
            planning_tokens: default_planning_tokens(),
            answer_tokens: default_answer_tokens(),
            anchor_count: default_anchor_count(),
            persona: None,
        }
    }
}

/// Web-search (evidence fetch) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Whether the engine may fetch external evidence at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Search endpoint returning DuckDuckGo-style instant-answer JSON
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    /// Evidence fetch timeout in seconds
    #[serde(default = "default_evidence_timeout_secs")]
    pub evidence_timeout_secs: u64,

    /// Maximum number of cited sources per fetch
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
}

fn default_search_endpoint() -> String {
    "https://api.duckduckgo.com/".into()
}
fn default_evidence_timeout_secs() -> u64 {
    12
}
fn default_max_sources() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_search_endpoint(),
            evidence_timeout_secs: default_evidence_timeout_secs(),
            max_sources: default_max_sources(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.causerie/config.toml).
    ///
    /// Environment variables override file values:
    /// - `CAUSERIE_API_KEY`
    /// - `CAUSERIE_BASE_URL`
    /// - `CAUSERIE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if config.model.api_key.is_none() {
            config.model.api_key = std::env::var("CAUSERIE_API_KEY").ok();
        }

        if let Ok(base_url) = std::env::var("CAUSERIE_BASE_URL") {
            config.model.base_url = base_url;
        }

        if let Ok(model) = std::env::var("CAUSERIE_MODEL") {
            config.model.model = model;
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
        dirs_home().join(".causerie")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.memory.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "memory.capacity must be greater than zero".into(),
            ));
        }

        let ctx = &self.context;
        if ctx.system_tokens + ctx.planning_tokens > ctx.total_tokens
            || ctx.system_tokens + ctx.answer_tokens > ctx.total_tokens
        {
            return Err(ConfigError::ValidationError(
                "context budgets must fit inside context.total_tokens".into(),
            ));
        }

        if self.search.evidence_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "search.evidence_timeout_secs must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.total_tokens, 4096);
        assert_eq!(config.search.evidence_timeout_secs, 12);
        assert!(config.memory.enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model.base_url, config.model.base_url);
        assert_eq!(parsed.memory.capacity, config.memory.capacity);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            model: ModelConfig {
                temperature: 5.0,
                ..ModelConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_rejected() {
        let config = AppConfig {
            memory: MemoryConfig {
                capacity: 0,
                ..MemoryConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_budget_rejected() {
        let config = AppConfig {
            context: ContextConfig {
                total_tokens: 1000,
                system_tokens: 800,
                answer_tokens: 2800,
                ..ContextConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.model.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[model]\nmodel = \"mistral:7b\"\n\n[memory]\ncapacity = 32\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model.model, "mistral:7b");
        assert_eq!(config.memory.capacity, 32);
        // untouched sections keep their defaults
        assert_eq!(config.context.anchor_count, 6);
        assert_eq!(config.search.max_sources, 5);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "not valid toml [[[").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ModelConfig {
            api_key: Some("secret-key".into()),
            ..ModelConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("localhost:11434"));
        assert!(toml_str.contains("evidence_timeout_secs"));
    }
}
