//! Snapshot persistence
//!
//! A [`SnapshotStore`] keeps the latest [`TreasurySnapshot`]. The file store
//! writes JSON next to the target and renames it into place, so a crash
//! mid-write leaves the previous snapshot readable.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::snapshot::TreasurySnapshot;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Somewhere a snapshot can be saved and loaded
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot
    async fn save(&self, snapshot: &TreasurySnapshot) -> StorageResult<()>;

    /// Load the stored snapshot, `None` if nothing was saved yet
    async fn load(&self) -> StorageResult<Option<TreasurySnapshot>>;

    /// Load the stored snapshot, failing if nothing was saved yet
    async fn load_required(&self) -> StorageResult<TreasurySnapshot> {
        self.load()
            .await?
            .ok_or_else(|| StorageError::NotFound("no snapshot stored".to_string()))
    }
}

/// Snapshot kept as a JSON file
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Store snapshots at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Where the snapshot lives
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &TreasurySnapshot) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = snapshot.to_json()?;
        let staging = self.staging_path();
        tokio::fs::write(&staging, json.as_bytes()).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        info!("Saved snapshot ({} proposals) to {}", snapshot.proposals.len(), self.path.display());
        Ok(())
    }

    async fn load(&self) -> StorageResult<Option<TreasurySnapshot>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No snapshot at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot = TreasurySnapshot::from_json(&json)?;
        debug!("Loaded snapshot from {}", self.path.display());
        Ok(Some(snapshot))
    }
}

/// Snapshot kept in memory as serialized bytes
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    data: Arc<RwLock<Option<Vec<u8>>>>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, snapshot: &TreasurySnapshot) -> StorageResult<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        *self.data.write().await = Some(bytes);
        Ok(())
    }

    async fn load(&self) -> StorageResult<Option<TreasurySnapshot>> {
        let data = self.data.read().await;
        match data.as_deref() {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }
}
