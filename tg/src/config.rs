//! toolguard configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::resilience::RobustConfig;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "TOOLGUARD_CONFIG";

/// Main toolguard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Retry, breaker and timeout policy
    #[serde(flatten)]
    pub resilience: RobustConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        self.resilience.validate().context("Invalid resilience policy")?;
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `$TOOLGUARD_CONFIG`, then `./.toolguard.yml`, then
    /// `<config dir>/toolguard/toolguard.yml`, then defaults.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(env_path);
            return Self::load_from_file(&path)
                .context(format!("Failed to load config from ${} ({})", CONFIG_ENV, path.display()));
        }

        // Try project-local config: .toolguard.yml
        let local_config = PathBuf::from(".toolguard.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/toolguard/toolguard.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("toolguard").join("toolguard.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Save config to file as YAML
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_yaml()?;
        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}
