//! Configuration for the definitions loader.

use modbus2mqtt_common::{Error, LoggingConfig, Result, load_config};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefinitionsConfig {
    /// Path of the register definitions document
    #[serde(default = "default_definitions")]
    pub definitions: PathBuf,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_definitions() -> PathBuf {
    PathBuf::from("modbus-definitions.json")
}

impl Default for DefinitionsConfig {
    fn default() -> Self {
        Self {
            definitions: default_definitions(),
            logging: LoggingConfig::default(),
        }
    }
}

impl DefinitionsConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: DefinitionsConfig = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.definitions.as_os_str().is_empty() {
            return Err(Error::Config(
                "Definitions path cannot be empty".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            level => Err(Error::Config(format!(
                "Invalid log level '{}' (use trace, debug, info, warn, or error)",
                level
            ))),
        }
    }

    /// Resolve the definitions path relative to the config file's directory.
    pub fn definitions_path(&self, config_path: &Path) -> PathBuf {
        match config_path.parent() {
            Some(dir) if self.definitions.is_relative() => dir.join(&self.definitions),
            _ => self.definitions.clone(),
        }
    }
}
