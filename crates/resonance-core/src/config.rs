//! Annotator configuration
//!
//! Layered: built-in defaults, then an optional TOML file, then environment
//! overrides. Credentials are only ever read from the environment.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Environment variable overriding the corpus location
pub const ENV_CORPUS_PATH: &str = "RESONANCE_CORPUS_PATH";
/// Environment variable overriding the model name
pub const ENV_MODEL: &str = "RESONANCE_MODEL";
/// Environment variable overriding the model request timeout (seconds)
pub const ENV_TIMEOUT_SECS: &str = "RESONANCE_TIMEOUT_SECS";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// JSON Lines file receiving confirmed samples
    pub corpus_path: PathBuf,
    /// Generative model settings
    pub model: ModelSettings,
    /// HTTP surface settings
    pub server: ServerSettings,
}

impl AnnotatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With corpus location
    #[inline]
    #[must_use]
    pub fn with_corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.corpus_path = path.into();
        self
    }

    /// With model name
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model.model = model.into();
        self
    }

    /// With HTTP listen address
    #[inline]
    #[must_use]
    pub fn with_server_addr(mut self, addr: SocketAddr) -> Self {
        self.server.addr = addr;
        self
    }

    /// Load defaults, then `path` if given, then process environment overrides
    ///
    /// # Errors
    /// - `ConfigError::Io` / `ConfigError::Parse` if the file cannot be used
    /// - `ConfigError::InvalidValue` if an override cannot be interpreted
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a TOML config file; absent keys keep their defaults
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::Parse` if it is not valid for this schema
    /// - `ConfigError::InvalidValue` if `model.timeout_secs` is zero
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        check_timeout("model.timeout_secs", config.model.timeout_secs)?;
        Ok(config)
    }

    /// Apply overrides looked up by variable name
    ///
    /// # Errors
    /// - `ConfigError::InvalidValue` if an override cannot be interpreted
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = lookup(ENV_CORPUS_PATH) {
            self.corpus_path = PathBuf::from(path);
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.model.model = model;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            let secs = secs.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS.to_string(),
                reason: format!("{e}"),
            })?;
            self.model.timeout_secs = check_timeout(ENV_TIMEOUT_SECS, secs)?;
        }
        Ok(self)
    }
}

// A zero timeout would fail every model call before it is sent
fn check_timeout(key: &str, secs: u64) -> Result<u64, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: "timeout must be at least one second".to_string(),
        });
    }
    Ok(secs)
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("training_data.jsonl"),
            model: ModelSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

/// Generative model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Model identifier
    pub model: String,
    /// API base URL
    pub api_base: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature (provider default when unset)
    pub temperature: Option<f32>,
    /// Ask the provider for a JSON response body
    pub json_mode: bool,
}

impl ModelSettings {
    /// Read the API key from the configured environment variable
    ///
    /// # Errors
    /// - `ConfigError::MissingApiKey` if the variable is unset or empty
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                var: self.api_key_env.clone(),
            })
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 30,
            temperature: None,
            json_mode: true,
        }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address
    pub addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3030)),
        }
    }
}
