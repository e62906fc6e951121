//! Configuration file support for hydrate.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/hydrate/config.toml`.

use crate::stats::{StreakOptions, DEFAULT_LOOKBACK_DAYS};
use crate::{Error, Preferences, ReminderSettings, Result, StreakPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub streak: StreakConfig,

    #[serde(default)]
    pub reminders: ReminderSettings,

    /// Preferences used until the user saves their own
    #[serde(default)]
    pub defaults: Preferences,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Streak computation configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreakConfig {
    #[serde(default)]
    pub policy: StreakPolicy,

    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            policy: StreakPolicy::default(),
            lookback_days: default_lookback_days(),
        }
    }
}

impl StreakConfig {
    pub fn options(&self) -> StreakOptions {
        StreakOptions {
            policy: self.policy,
            lookback_days: self.lookback_days,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("hydrate")
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the engine or reminder loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.streak.lookback_days == 0 {
            return Err(Error::Config("streak.lookback_days must be at least 1".into()));
        }
        self.reminders
            .validate()
            .map_err(|e| Error::Config(format!("reminders: {}", e)))?;
        self.defaults
            .validate()
            .map_err(|e| Error::Config(format!("defaults: {}", e)))?;
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("hydrate").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
