//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - docpart.toml (default configuration)
//! - docpart.local.toml (git-ignored local overrides)
//! - Environment variables (DOCPART_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # docpart.toml
//! [translation]
//! max_nesting_depth = 100
//!
//! [identifiers]
//! max_identifier_len = 63
//! max_attempts = 1000
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! DOCPART_TRANSLATION__MAX_NESTING_DEPTH=64
//! DOCPART_LOGGING__LEVEL=debug
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

const ENV_PREFIX: &str = "DOCPART_";

/// Errors loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Source could not be read or parsed
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// Values parsed but make no sense
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub identifiers: IdentifierConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// D2R settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Maximum number of nested containers in one document, root included
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
}

fn default_max_nesting_depth() -> usize {
    100
}

impl Default for TranslationConfig {
    fn default() -> Self {
        TranslationConfig {
            max_nesting_depth: default_max_nesting_depth(),
        }
    }
}

/// Physical identifier constraints of the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierConfig {
    /// Longest table or column identifier the backend accepts
    #[serde(default = "default_max_identifier_len")]
    pub max_identifier_len: usize,

    /// Counter suffixes tried before giving up on a unique identifier
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

fn default_max_identifier_len() -> usize {
    63
}

fn default_max_attempts() -> usize {
    1000
}

impl Default for IdentifierConfig {
    fn default() -> Self {
        IdentifierConfig {
            max_identifier_len: default_max_identifier_len(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. built-in defaults
    /// 2. docpart.toml (base configuration)
    /// 3. docpart.local.toml (local overrides, git-ignored)
    /// 4. Environment variables (DOCPART_* prefix)
    pub fn load() -> Result<Self, ConfigError> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("docpart.toml"))
            .merge(Toml::file("docpart.local.toml"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, with environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.translation.max_nesting_depth == 0 {
            return Err(ConfigError::Invalid(
                "translation.max_nesting_depth must be at least 1".to_string(),
            ));
        }
        // room for a name character plus a counter and type suffix
        if self.identifiers.max_identifier_len < 8 {
            return Err(ConfigError::Invalid(format!(
                "identifiers.max_identifier_len must be at least 8, got {}",
                self.identifiers.max_identifier_len
            )));
        }
        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be 'text' or 'json', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }
}
