//! Configuration parsing.
//!
//! Warden reads a TOML file. Every key is optional; the defaults reproduce
//! the role names the bot has always used.
//!
//! ```toml
//! reconcile_interval_secs = 60
//! directory_timeout_ms = 10000
//! database_path = "warden.db"
//!
//! [capabilities]
//! detained = { id = "1122334455" }
//! verified = { name_contains = "verificado", name_excludes = "no" }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_core::CapabilitySelector;
use warden_store::SqliteStore;

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML did not parse.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WardenConfig {
    /// Seconds between reconciliation ticks.
    pub reconcile_interval_secs: u64,

    /// Deadline for each directory call, in milliseconds.
    pub directory_timeout_ms: u64,

    /// SQLite file. In-memory when absent.
    pub database_path: Option<PathBuf>,

    /// How each well-known capability is found.
    pub capabilities: CapabilityConfig,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: 60,
            directory_timeout_ms: 10_000,
            database_path: None,
            capabilities: CapabilityConfig::default(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "reconcile_interval_secs must be positive".into(),
            ));
        }
        if self.directory_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "directory_timeout_ms must be positive".into(),
            ));
        }
        self.capabilities.validate()
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }

    /// Open the configured SQLite store.
    pub fn open_store(&self) -> warden_store::Result<SqliteStore> {
        match &self.database_path {
            Some(path) => SqliteStore::open(path),
            None => SqliteStore::open_memory(),
        }
    }
}

/// One selector per well-known capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CapabilityConfig {
    pub tier1: CapabilitySelector,
    pub tier2: CapabilitySelector,
    pub tier3: CapabilitySelector,
    pub detained: CapabilitySelector,
    pub unverified: CapabilitySelector,
    pub verified: CapabilitySelector,
    pub security: CapabilitySelector,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            tier1: CapabilitySelector::name_contains("warn 1"),
            tier2: CapabilitySelector::name_contains("warn 2"),
            tier3: CapabilitySelector::name_contains("warn 3"),
            detained: CapabilitySelector::name_contains("detenido"),
            unverified: CapabilitySelector::name_contains("no verificado"),
            verified: CapabilitySelector::name_contains("verificado").excluding("no"),
            security: CapabilitySelector::name_contains("seguridad"),
        }
    }
}

impl CapabilityConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("tier1", &self.tier1),
            ("tier2", &self.tier2),
            ("tier3", &self.tier3),
            ("detained", &self.detained),
            ("unverified", &self.unverified),
            ("verified", &self.verified),
            ("security", &self.security),
        ];
        for (key, selector) in all {
            selector
                .validate()
                .map_err(|e| ConfigError::Validation(format!("capabilities.{}: {}", key, e)))?;
        }
        Ok(())
    }
}
