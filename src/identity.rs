//! Pseudonymous identity rotation.
//!
//! Two independent mechanisms keep reports unlinkable across months:
//!
//! - [`monthly_hash`] derives a salted SHA-512 tag from a stable
//!   [`DeviceId`] and a calendar month. It is re-derivable, so every report
//!   from one month carries the same tag, and different salts produce
//!   uncorrelated tag streams from the same device id.
//! - [`RotatingProfileIdentity`] is a stored random id that is thrown away
//!   and regenerated whenever the UTC month changes.

use crate::dates::IsoDate;
use crate::error::{ReportError, Result};
use crate::scheduler::queue::Report;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Salt for tags attached to app-level diagnostics reports.
pub const DIAGNOSTICS_TAG_SALT: &str = "report-queue.diagnostics.v1";

/// Salt for tags attached to feature-usage counters.
pub const USAGE_TAG_SALT: &str = "report-queue.usage.v1";

const RANDOM_ID_BYTES: usize = 16;

/// `sha512("{year}-{monthIndex}-{device_id}-{salt}")` as lowercase hex.
///
/// `monthIndex` is zero-based (January = 0), taken from `date`'s UTC
/// calendar fields.
#[must_use]
pub fn monthly_hash<D: Datelike>(salt: &str, device_id: &str, date: &D) -> String {
    let input = format!("{}-{}-{}-{}", date.year(), date.month0(), device_id, salt);
    hex::encode(Sha512::digest(input.as_bytes()))
}

fn random_hex_id() -> String {
    let bytes: [u8; RANDOM_ID_BYTES] = rand::random();
    hex::encode(bytes)
}

fn is_random_hex_id(value: &str) -> bool {
    value.len() == RANDOM_ID_BYTES * 2 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Stable random per-device identifier (16 bytes, hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_hex_id())
    }

    /// Wrap an existing id string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the id stored at `path`, creating and persisting one if the file
    /// is missing or does not hold a valid id.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Identity`] if the file exists but cannot be
    /// read, or a new id cannot be written.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let trimmed = content.trim();
                if is_random_hex_id(trimmed) {
                    return Ok(Self(trimmed.to_owned()));
                }
                warn!(path = %path.display(), "replacing malformed device id");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ReportError::Identity(format!(
                    "cannot read device id {}: {e}",
                    path.display()
                )));
            }
        }

        let id = Self::generate();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ReportError::Identity(format!("cannot create device id directory: {e}"))
            })?;
        }
        std::fs::write(path, &id.0).map_err(|e| {
            ReportError::Identity(format!("cannot write device id {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "created new device id");
        Ok(id)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes [`monthly_hash`] tags for one salt and device.
#[derive(Debug, Clone)]
pub struct MonthlyTagger {
    salt: String,
    device_id: DeviceId,
}

impl MonthlyTagger {
    /// Tagger for `salt` over `device_id`.
    pub fn new(salt: impl Into<String>, device_id: DeviceId) -> Self {
        Self {
            salt: salt.into(),
            device_id,
        }
    }

    /// Tag for the month containing `date`.
    #[must_use]
    pub fn tag_for<D: Datelike>(&self, date: &D) -> String {
        monthly_hash(&self.salt, self.device_id.as_str(), date)
    }

    /// Tag for a batch about to be sent.
    ///
    /// Uses the newest report's generation day rather than the wall clock, so
    /// a report generated on the last day of a month and delivered after
    /// midnight still carries that month's tag. `None` for an empty batch.
    #[must_use]
    pub fn tag_for_batch<T>(&self, reports: &[Report<T>]) -> Option<String> {
        let newest: IsoDate = reports.iter().map(|r| r.date_generated).max()?;
        Some(self.tag_for(&newest.to_datetime()))
    }
}

/// Random profile id regenerated once per UTC month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotatingProfileIdentity {
    /// 16 random bytes, hex.
    pub id: String,
    /// `"YYYY-M"` of the UTC month the id was generated in.
    #[serde(rename = "idMonth")]
    pub id_month: String,
}

impl RotatingProfileIdentity {
    /// `"YYYY-M"` key for `now` (1-based month, not padded).
    #[must_use]
    pub fn month_key(now: &DateTime<Utc>) -> String {
        format!("{}-{}", now.year(), now.month())
    }

    /// Fresh identity stamped with `now`'s month.
    #[must_use]
    pub fn generate(now: &DateTime<Utc>) -> Self {
        Self {
            id: random_hex_id(),
            id_month: Self::month_key(now),
        }
    }

    /// Whether the identity was generated in `now`'s UTC month.
    #[must_use]
    pub fn is_current(&self, now: &DateTime<Utc>) -> bool {
        self.id_month == Self::month_key(now)
    }

    /// Replace the id if its month is not `now`'s. Returns `true` on rotation.
    pub fn rotate_if_stale(&mut self, now: &DateTime<Utc>) -> bool {
        if self.is_current(now) {
            return false;
        }
        let previous_month = std::mem::take(&mut self.id_month);
        *self = Self::generate(now);
        debug!(from = %previous_month, to = %self.id_month, "rotated profile identity");
        true
    }

    /// Startup check: returns the identity to use and whether it changed.
    #[must_use]
    pub fn ensure(stored: Option<Self>, now: &DateTime<Utc>) -> (Self, bool) {
        match stored {
            Some(mut identity) => {
                let rotated = identity.rotate_if_stale(now);
                (identity, rotated)
            }
            None => (Self::generate(now), true),
        }
    }

    /// Load a persisted identity. `None` when missing or invalid.
    pub fn load(path: &Path) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(path = %path.display(), "ignoring invalid profile identity: {e}");
                None
            }
        }
    }

    /// Persist to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Identity`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ReportError::Identity(format!("cannot create identity directory: {e}"))
            })?;
        }
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ReportError::Identity(format!("cannot serialize identity: {e}")))?;
        std::fs::write(path, json).map_err(|e| {
            ReportError::Identity(format!("cannot write identity {}: {e}", path.display()))
        })
    }

    /// Load from `path`, rotate if stale, and persist when changed.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Identity`] if a changed identity cannot be saved.
    pub fn load_and_rotate(path: &Path, now: &DateTime<Utc>) -> Result<Self> {
        let (identity, changed) = Self::ensure(Self::load(path), now);
        if changed {
            identity.save(path)?;
            info!(month = %identity.id_month, "profile identity regenerated");
        }
        Ok(identity)
    }
}
