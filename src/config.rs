//! # Module Configuration
//!
//! [`ModuleConfig`] carries the settings of the resource module. It is plain
//! serde data so hosts can embed it in their own TOML files or load it
//! standalone with [`ModuleConfig::load`].
//!
//! ```toml
//! default_resource = "ResourceGroup"
//! max_parallelism = 8
//! event_capacity = 64
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors raised while loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings of the resource module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// Type of the root resource created when the store is empty at boot.
    pub default_resource: String,
    /// Upper bound of concurrently running per-node tasks in bulk phases.
    pub max_parallelism: usize,
    /// Capacity of the broadcast channel carrying manager events.
    pub event_capacity: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            default_resource: crate::model::RESOURCE_GROUP_TYPE.to_string(),
            max_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            event_capacity: 64,
        }
    }
}

impl ModuleConfig {
    /// Parses and validates a TOML document. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_resource.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_resource must not be empty".to_string(),
            ));
        }
        if self.max_parallelism == 0 {
            return Err(ConfigError::Invalid(
                "max_parallelism must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = ModuleConfig::from_toml("default_resource = \"Cell\"").unwrap();
        assert_eq!(config.default_resource, "Cell");
        assert_eq!(config.event_capacity, 64);
        assert!(config.max_parallelism >= 1);
    }

    #[test]
    fn rejects_zero_parallelism() {
        let result = ModuleConfig::from_toml("max_parallelism = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_blank_default_resource() {
        let result = ModuleConfig::from_toml("default_resource = \"  \"");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "default_resource = \"Plant\"\nmax_parallelism = 2").unwrap();

        let config = ModuleConfig::load(file.path()).unwrap();
        assert_eq!(config.default_resource, "Plant");
        assert_eq!(config.max_parallelism, 2);
    }

    #[test]
    fn reports_parse_errors() {
        let result = ModuleConfig::from_toml("max_parallelism = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
