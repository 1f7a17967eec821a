//! Session snapshot persistence
//!
//! The engine saves opportunistic snapshots (on commit and on a periodic
//! timer) and loads the last one on startup to resume an interrupted
//! session. Save/load failures are logged by callers and never abort an
//! in-progress recording.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::transcript::TranscriptSegment;

/// Durable view of an in-progress or completed session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub transcript: String,
    pub segments: Vec<TranscriptSegment>,
    pub triggered_tips: Vec<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub is_recording: bool,
}

/// Key-value persistence collaborator for session snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;
    async fn load(&self) -> Result<Option<SessionSnapshot>>;
    async fn clear(&self) -> Result<()>;
}

/// Snapshot store backed by a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create snapshot directory")?;
            }
        }
        let payload = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::write(&self.path, payload)
            .await
            .context("Failed to write session snapshot")?;
        debug!(path = %self.path.display(), "session snapshot saved");
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read session snapshot"),
        };
        let snapshot =
            serde_json::from_slice(&bytes).context("Failed to parse session snapshot")?;
        Ok(Some(snapshot))
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session snapshot"),
        }
    }
}

/// In-memory snapshot store, for tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<SessionSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        *self.inner.lock().await = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Option<SessionSnapshot>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.lock().await = None;
        Ok(())
    }
}
