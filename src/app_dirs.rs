//! Application directory paths for the report queue.
//!
//! Uses the [`dirs`] crate for platform-appropriate resolution.
//!
//! | Purpose | macOS | Linux |
//! |---------|-------|-------|
//! | Data | `~/Library/Application Support/report-queue/` | `~/.local/share/report-queue/` |
//! | Config | `~/Library/Application Support/report-queue/` | `~/.config/report-queue/` |
//!
//! # Environment Overrides
//!
//! - `REPORT_QUEUE_DATA_DIR`: overrides [`data_dir`]
//! - `REPORT_QUEUE_CONFIG_DIR`: overrides [`config_dir`]

use std::ffi::OsString;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "report-queue";

/// Persistent data root: queue file, device id, profile identity.
#[must_use]
pub fn data_dir() -> PathBuf {
    resolve(
        std::env::var_os("REPORT_QUEUE_DATA_DIR"),
        dirs::data_dir(),
        "/tmp/report-queue-data",
    )
}

/// Config root holding `config.toml`.
#[must_use]
pub fn config_dir() -> PathBuf {
    resolve(
        std::env::var_os("REPORT_QUEUE_CONFIG_DIR"),
        dirs::config_dir(),
        "/tmp/report-queue-config",
    )
}

/// Main config file path (`config_dir()/config.toml`).
#[must_use]
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Persisted diagnostics queue (`data_dir()/diagnostics-queue.json`).
#[must_use]
pub fn queue_file() -> PathBuf {
    data_dir().join("diagnostics-queue.json")
}

/// Stable per-device identifier (`data_dir()/device-id`).
#[must_use]
pub fn device_id_file() -> PathBuf {
    data_dir().join("device-id")
}

/// Rotating profile identity (`data_dir()/profile-identity.json`).
#[must_use]
pub fn profile_identity_file() -> PathBuf {
    data_dir().join("profile-identity.json")
}

fn resolve(override_dir: Option<OsString>, base: Option<PathBuf>, fallback: &str) -> PathBuf {
    if let Some(dir) = override_dir {
        return PathBuf::from(dir);
    }
    base.map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(fallback))
}
