//! Configuration Loader
//!
//! Loads and validates the application configuration (TOML). The pipeline's
//! tuning knobs live in the separate JSON strategy map, see `strategy_map`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration structure matching config/regime-gate.toml
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub reasoning: ReasoningSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Pipeline catalog locations
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PipelineSection {
    /// Layered JSON strategy map (regime thresholds, session profiles, validation rules)
    #[serde(default)]
    pub strategy_map: Option<String>,
    /// TOML template catalog; built-in templates are used when unset
    #[serde(default)]
    pub template_catalog: Option<String>,
    /// Re-read catalogs when the backing file's mtime changes
    #[serde(default = "default_hot_reload")]
    pub hot_reload: bool,
}

/// Reasoning service connection
#[derive(Debug, Clone, Deserialize)]
pub struct ReasoningSection {
    /// HTTP endpoint that turns a rendered prompt into a candidate
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional bearer token
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ReasoningSection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

impl ReasoningSection {
    /// API key with environment variable fallback.
    /// Checks REASONING_API_KEY when the config value is empty/None.
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("REASONING_API_KEY").ok().filter(|k| !k.is_empty())
    }

    /// Endpoint with REASONING_ENDPOINT override
    pub fn get_endpoint(&self) -> Option<String> {
        std::env::var("REASONING_ENDPOINT")
            .ok()
            .filter(|e| !e.is_empty())
            .or_else(|| self.endpoint.clone())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_hot_reload() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Expand `~` and environment variables in a configured path
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).to_string())
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reasoning.timeout_secs == 0 || self.reasoning.timeout_secs > 600 {
            return Err(ConfigError::ValidationError(format!(
                "reasoning.timeout_secs must be 1-600, got {}",
                self.reasoning.timeout_secs
            )));
        }

        if let Some(ref endpoint) = self.reasoning.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "reasoning.endpoint must be an http(s) URL, got {}",
                    endpoint
                )));
            }
        }

        for (name, path) in [
            ("pipeline.strategy_map", &self.pipeline.strategy_map),
            ("pipeline.template_catalog", &self.pipeline.template_catalog),
        ] {
            if matches!(path, Some(p) if p.trim().is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "{} cannot be empty",
                    name
                )));
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be trace/debug/info/warn/error, got {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    pub fn strategy_map_path(&self) -> Option<PathBuf> {
        self.pipeline.strategy_map.as_deref().map(expand_path)
    }

    pub fn template_catalog_path(&self) -> Option<PathBuf> {
        self.pipeline.template_catalog.as_deref().map(expand_path)
    }
}
