//! Generator configuration (loom.toml)
//!
//! Defaults shared by the compilation service and both wrapper generators.
//! Every key is optional:
//!
//! ```toml
//! persist = false
//! working_dir = "/var/cache/loom"
//! namespace = "Proxies"
//! type_name = "Proxy"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while loading a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Validation error
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Generator defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Write compiled modules to disk before loading them
    pub persist: bool,

    /// Directory for persisted modules (defaults to a per-program temp dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Reformat generated source
    pub prettify: bool,

    /// Embed generated source in instance wrappers
    pub include_source: bool,

    pub warnings_as_errors: bool,

    /// Namespace of generated types
    pub namespace: String,

    /// Name of generated types
    pub type_name: String,

    /// Name of the method on callable wrappers
    pub method_name: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            persist: true,
            working_dir: None,
            prettify: true,
            include_source: true,
            warnings_as_errors: false,
            namespace: "GeneratedNamespace".to_string(),
            type_name: "GeneratedType".to_string(),
            method_name: "Run".to_string(),
        }
    }
}

impl GeneratorConfig {
    /// Parse a configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a configuration from a string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: GeneratorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate names used in generated source
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_identifier(&self.type_name) {
            return Err(ConfigError::Validation(format!(
                "Invalid type name: '{}'. Must be an identifier",
                self.type_name
            )));
        }
        if !is_identifier(&self.method_name) {
            return Err(ConfigError::Validation(format!(
                "Invalid method name: '{}'. Must be an identifier",
                self.method_name
            )));
        }
        if !self.namespace.split('.').all(is_identifier) {
            return Err(ConfigError::Validation(format!(
                "Invalid namespace: '{}'. Must be dot-separated identifiers",
                self.namespace
            )));
        }
        Ok(())
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}
