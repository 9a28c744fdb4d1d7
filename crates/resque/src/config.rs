//! Configuration management for resque.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::registry::DEFAULT_REGISTRY_KEY;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "resque";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "registry.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `RESQUE_`, sections split on `__`)
/// 2. TOML config file at `~/.config/resque/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Booking dispatch configuration.
    pub dispatch: DispatchConfig,
    /// Reverse geocoding configuration.
    pub geocoder: GeocoderConfig,
    /// Registry storage configuration.
    pub storage: StorageConfig,
}

/// Where composed bookings are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Deep-link base the destination is appended to.
    pub base_url: String,
    /// Dispatch number, digits only with country code.
    pub destination: String,
    /// First line of every booking message.
    pub title: String,
}

/// Reverse geocoding settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Reverse lookup endpoint.
    pub endpoint: String,
    /// Overall deadline for a location lookup in milliseconds.
    pub timeout_ms: u64,
    /// `User-Agent` sent with lookups.
    pub user_agent: String,
}

/// Registry storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/resque/registry.db`
    pub database_path: Option<PathBuf>,
    /// Key the donor registry is stored under.
    pub registry_key: String,
    /// How often to check for writes from other processes, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://wa.me".to_string(),
            destination: "919999999999".to_string(),
            title: "RESQuE Ambulance Booking".to_string(),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/reverse".to_string(),
            timeout_ms: 10_000,
            user_agent: concat!("resque/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved at runtime
            registry_key: DEFAULT_REGISTRY_KEY.to_string(),
            poll_interval_ms: 1_000,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("RESQUE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let destination = &self.dispatch.destination;
        if destination.is_empty() || !destination.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "dispatch destination must be digits only with no separators, got '{destination}'"
                ),
            });
        }

        if let Err(e) = reqwest::Url::parse(&self.dispatch.base_url) {
            return Err(Error::ConfigValidation {
                message: format!("invalid dispatch base_url '{}': {e}", self.dispatch.base_url),
            });
        }

        if let Err(e) = reqwest::Url::parse(&self.geocoder.endpoint) {
            return Err(Error::ConfigValidation {
                message: format!("invalid geocoder endpoint '{}': {e}", self.geocoder.endpoint),
            });
        }

        if self.geocoder.timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "geocoder timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.storage.registry_key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "storage registry_key must not be empty".to_string(),
            });
        }

        if self.storage.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "storage poll_interval_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the location lookup deadline as a Duration.
    #[must_use]
    pub fn geocode_timeout(&self) -> Duration {
        Duration::from_millis(self.geocoder.timeout_ms)
    }

    /// Get the change polling interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.storage.poll_interval_ms)
    }
}
