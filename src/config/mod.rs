//! Configuration loading from config.toml and the environment.
//!
//! `config.toml` seeds the catalog and tunes the scheduler and the store retry
//! policy; every section has defaults so an empty file is valid.

/// Catalog seed entries
pub mod catalog;

/// Database configuration and connection management
pub mod database;

/// Admin account configuration
pub mod users;

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub use catalog::CatalogItemConfig;
pub use users::AdminConfig;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct ShopConfig {
    /// Catalog items to seed
    #[serde(default)]
    pub items: Vec<CatalogItemConfig>,
    /// Scheduler driver settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Store retry settings
    #[serde(default)]
    pub retry: RetryConfig,
    /// Accounts that get the admin flag
    #[serde(default)]
    pub admins: AdminConfig,
}

/// `[scheduler]` section
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between polls for due tasks
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Maximum tasks handled per poll
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
}

const fn default_tick_secs() -> u64 {
    30
}

const fn default_batch_size() -> u64 {
    100
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl SchedulerConfig {
    /// Poll interval, never shorter than one second
    #[must_use]
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

/// `[retry]` section
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts before a transient store error is reported
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Upper bound on any single delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    50
}

const fn default_max_delay_ms() -> u64 {
    1_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Loads the shop configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - An item's effect does not match a known effect type
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ShopConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Parses config.toml contents
pub fn parse_config(contents: &str) -> Result<ShopConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `CONFIG_PATH`, or ./config.toml.
///
/// A missing file is not an error: the bot starts with an empty catalog and defaults.
pub fn load_default_config() -> Result<ShopConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    if Path::new(&path).exists() {
        load_config(path)
    } else {
        tracing::warn!("No config file at {path}, using defaults");
        Ok(ShopConfig::default())
    }
}
