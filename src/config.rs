//! Configuration for the report scheduler.

use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default delay between scheduler ticks (5 minutes).
pub const DEFAULT_SEND_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Per-scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Milliseconds between repeating update cycles.
    pub send_interval_ms: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            send_interval_ms: DEFAULT_SEND_INTERVAL_MS,
        }
    }
}

impl ReporterConfig {
    /// Config with the given tick interval.
    pub fn with_send_interval(interval: Duration) -> Self {
        Self {
            send_interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Tick interval as a [`Duration`].
    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    /// Reject settings the scheduler cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Config`] when the interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.send_interval_ms == 0 {
            return Err(ReportError::Config(
                "send_interval_ms must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ReportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.is_file() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ReportError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
