//! Configuration management
//!
//! Handles TOML configuration parsing and validation. Every section and key
//! is optional; absent values take the documented defaults.

use crate::constants::{
    APP_SUPPORT_DIR, CONFIG_FILE_NAME, DEFAULT_POLL_INTERVAL, DEFAULT_QUIT_GRACE_PERIOD,
    POLLING_INTERVAL_MAX, POLLING_INTERVAL_MIN, QUIT_GRACE_PERIOD_MAX,
};
use crate::logging::LogLevel;
use crate::monitor::MonitorSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnforcementConfiguration {
    pub monitor: MonitorSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
}

/// Monitor timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorSection {
    /// Poll period in seconds (0.1-300.0)
    pub poll_interval: f64,
    /// Seconds an application gets to honour a graceful quit (0.0-300.0)
    pub quit_grace_period: f64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL.as_secs_f64(),
            quit_grace_period: DEFAULT_QUIT_GRACE_PERIOD.as_secs_f64(),
        }
    }
}

/// State file location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    /// Overrides `<data_dir>/FocusGuard/settings.json`
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: LogLevel,
}

/// Invalid configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Note: bounds must match POLLING_INTERVAL_MIN/MAX in constants.rs
    #[error("Invalid polling interval: {0}. Must be between 0.1 and 300.0 seconds")]
    InvalidInterval(f64),
    #[error("Invalid quit grace period: {0}. Must be between 0.0 and 300.0 seconds")]
    InvalidGracePeriod(f64),
}

impl EnforcementConfiguration {
    /// Parse and validate a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Invalid configuration file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicitly named file, else the default file if present, else defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        match Self::default_config_path() {
            Ok(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<data_dir>/FocusGuard/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        let base = dirs::data_dir().context("No application-support directory for this user")?;
        Ok(base.join(APP_SUPPORT_DIR).join(CONFIG_FILE_NAME))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let interval = self.monitor.poll_interval;
        if !(POLLING_INTERVAL_MIN..=POLLING_INTERVAL_MAX).contains(&interval) {
            return Err(ConfigError::InvalidInterval(interval));
        }
        let grace = self.monitor.quit_grace_period;
        if !(0.0..=QUIT_GRACE_PERIOD_MAX).contains(&grace) {
            return Err(ConfigError::InvalidGracePeriod(grace));
        }
        Ok(())
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs_f64(self.monitor.poll_interval),
            quit_grace_period: Duration::from_secs_f64(self.monitor.quit_grace_period),
        }
    }

    /// Resolved state file path; a command-line override wins
    pub fn state_path(&self, override_path: Option<&Path>) -> crate::error::Result<PathBuf> {
        match override_path.or(self.storage.state_path.as_deref()) {
            Some(path) => Ok(path.to_path_buf()),
            None => crate::store::default_state_path(),
        }
    }
}
