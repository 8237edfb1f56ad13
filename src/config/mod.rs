//! Configuration for registry bootstrap
//!
//! Loaded from a TOML file or built in code. Every field has a serde
//! default so a partial (or empty) file is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Registry bootstrap configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Enable the module system. When false, bootstrap is a no-op.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Module names to load eagerly after the static install pass.
    /// Matched against registered identities by full or short name.
    #[serde(default)]
    pub autoload: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            autoload: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
