//! # Configuration System
//!
//! YAML configuration for MBSTOI scoring runs:
//!
//! - Analysis parameters (rates, frame sizes, band layout, EC grid, jitter)
//! - Optional internal noise and parallel search
//! - Logging
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `MBSTOI_CONFIG` environment variable
//! 2. `./mbstoi.yaml` (current directory)
//! 3. `~/.config/mbstoi/config.yaml` (user config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! params:
//!   grid_coarseness: 2
//!   internal_noise: false
//!   parallel: true
//!   jitter:
//!     sigma_delta_0: 6.5e-5
//!
//! logging:
//!   level: debug
//!   format: json
//! ```
//!
//! Every field is optional; missing fields take the published MBSTOI values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::metric::Mbstoi;
use crate::observe::LogConfig;
use crate::params::MbstoiParams;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "MBSTOI_CONFIG";

/// Error type for configuration operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Configuration file not found
    NotFound(String),
    /// Failed to read or write the configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid configuration value
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "config not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Complete MBSTOI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MbstoiConfig {
    /// Configuration version
    pub version: String,
    pub params: MbstoiParams,
    pub logging: LogConfig,
}

impl Default for MbstoiConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            params: MbstoiParams::default(),
            logging: LogConfig::default(),
        }
    }
}

impl MbstoiConfig {
    /// Load configuration from the default search path.
    ///
    /// An explicit `MBSTOI_CONFIG` path that does not exist is an error;
    /// otherwise defaults are returned when no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(format!(
                    "{} points to {}",
                    CONFIG_ENV_VAR,
                    path.display()
                )));
            }
            return Self::load_from(&path);
        }

        for path in Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config = Self::parse(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Configuration search paths, most specific first.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./mbstoi.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "mbstoi") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.params.parallel && !cfg!(feature = "parallel") {
            tracing::warn!("parallel search requested but the `parallel` feature is disabled");
        }
        Ok(())
    }

    /// Build an evaluator for the configured parameters.
    pub fn evaluator(&self) -> Result<Mbstoi, ConfigError> {
        Mbstoi::new(self.params.clone()).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            params: MbstoiParams::builder().grid_coarseness(2).parallel(true).build(),
            logging: LogConfig::batch(),
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
