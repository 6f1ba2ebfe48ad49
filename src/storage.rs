//! Durable storage for the report queue.
//!
//! Defines the [`QueueStorage`] trait used by the scheduler, a JSON file
//! backend ([`FileQueueStorage`]) and an in-memory backend
//! ([`MemoryQueueStorage`]) for tests and ephemeral hosts.
//!
//! Reads collapse every failure (missing file, I/O error, malformed JSON,
//! invalid dates) into `None`. A corrupt queue is therefore indistinguishable
//! from no queue and the scheduler simply starts over.

use crate::error::{ReportError, Result};
use crate::scheduler::queue::ReportQueue;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Persisted queue backend.
#[async_trait]
pub trait QueueStorage<T>: Send + Sync {
    /// Load the queue. `None` when absent, unreadable or invalid.
    async fn get(&self) -> Option<ReportQueue<T>>;

    /// Overwrite the persisted queue.
    async fn set(&self, queue: &ReportQueue<T>) -> Result<()>;

    /// Delete the persisted queue. Succeeds when nothing is stored.
    async fn remove(&self) -> Result<()>;
}

/// JSON file backed queue storage.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves either the old or the new queue.
#[derive(Debug, Clone)]
pub struct FileQueueStorage {
    path: PathBuf,
}

impl FileQueueStorage {
    /// Store the queue at `path`. Parent directories are created on write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the queue file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

#[async_trait]
impl<T> QueueStorage<T> for FileQueueStorage
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self) -> Option<ReportQueue<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "cannot read report queue: {e}");
                return None;
            }
        };

        match serde_json::from_slice::<ReportQueue<T>>(&bytes) {
            Ok(queue) => Some(queue),
            Err(e) => {
                warn!(path = %self.path.display(), "ignoring invalid report queue: {e}");
                None
            }
        }
    }

    async fn set(&self, queue: &ReportQueue<T>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ReportError::Storage(format!(
                    "cannot create queue directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let json = serde_json::to_vec_pretty(queue)
            .map_err(|e| ReportError::Storage(format!("cannot serialize report queue: {e}")))?;

        let tmp_path = self.tmp_path();
        tokio::fs::write(&tmp_path, json).await.map_err(|e| {
            ReportError::Storage(format!(
                "cannot write temp file {}: {e}",
                tmp_path.display()
            ))
        })?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            ReportError::Storage(format!(
                "cannot rename temp file to {}: {e}",
                self.path.display()
            ))
        })?;

        debug!(
            path = %self.path.display(),
            reports = queue.reports.len(),
            "report queue saved"
        );
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "report queue removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ReportError::Storage(format!(
                "cannot delete report queue {}: {e}",
                self.path.display()
            ))),
        }
    }
}

/// In-memory queue storage.
///
/// Holds the queue as serialized JSON so reads go through the same
/// validation path as the file backend. Cheaply cloneable; clones share
/// state.
#[derive(Debug, Clone, Default)]
pub struct MemoryQueueStorage {
    slot: Arc<RwLock<Option<String>>>,
}

impl MemoryQueueStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with raw JSON, valid or not.
    pub fn with_raw(json: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(Some(json.into()))),
        }
    }

    /// Raw JSON currently stored, if any.
    pub async fn raw(&self) -> Option<String> {
        self.slot.read().await.clone()
    }
}

#[async_trait]
impl<T> QueueStorage<T> for MemoryQueueStorage
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    async fn get(&self) -> Option<ReportQueue<T>> {
        let slot = self.slot.read().await;
        let raw = slot.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(queue) => Some(queue),
            Err(e) => {
                warn!("ignoring invalid in-memory report queue: {e}");
                None
            }
        }
    }

    async fn set(&self, queue: &ReportQueue<T>) -> Result<()> {
        let json = serde_json::to_string(queue)
            .map_err(|e| ReportError::Storage(format!("cannot serialize report queue: {e}")))?;
        *self.slot.write().await = Some(json);
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        *self.slot.write().await = None;
        Ok(())
    }
}
