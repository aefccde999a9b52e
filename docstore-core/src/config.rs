// docstore-core/src/config.rs
// Store configuration loaded from TOML

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DocStoreError, Result};
use crate::logging::{init_logging, LogLevel};

/// Configuration for a `DatabaseCore`
///
/// Every field has a default, so an empty TOML document is a valid config:
///
/// ```toml
/// database_name = "transport"
/// default_batch_size = 500
/// log_level = "debug"
/// regex_cache_capacity = 256
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub database_name: String,
    /// Page size used by the batch protocol when the caller passes none
    pub default_batch_size: usize,
    pub log_level: String,
    /// Number of compiled `$regex` patterns kept in the LRU cache
    pub regex_cache_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            database_name: "docstore".to_string(),
            default_batch_size: 1000,
            log_level: "warn".to_string(),
            regex_cache_capacity: 100,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| DocStoreError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parsed log level; unknown names fall back to the default
    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_str(&self.log_level).unwrap_or_default()
    }

    /// Install the stderr subscriber at the configured level
    ///
    /// Opt-in: opening a database never touches the global subscriber.
    /// Returns `false` if a subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        init_logging(self.log_level())
    }

    fn validate(&self) -> Result<()> {
        if self.default_batch_size == 0 {
            return Err(DocStoreError::Config(
                "default_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.regex_cache_capacity == 0 {
            return Err(DocStoreError::Config(
                "regex_cache_capacity must be greater than zero".to_string(),
            ));
        }
        if LogLevel::from_str(&self.log_level).is_none() {
            return Err(DocStoreError::Config(format!(
                "Unknown log level: {}",
                self.log_level
            )));
        }
        Ok(())
    }
}
