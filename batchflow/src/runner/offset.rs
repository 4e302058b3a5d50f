//! Source offset tracking.

use crate::errors::OffsetError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Tracks the source's position and whether it has been exhausted.
///
/// The pipeline consults `is_finished` at the top of each cycle, seeds every
/// new batch from `offset`, and calls `commit` once the batch has passed
/// through every stage.
#[async_trait]
pub trait SourceOffsetTracker: Send + Sync {
    /// Returns true if the source has no further data.
    async fn is_finished(&self) -> Result<bool, OffsetError>;

    /// Returns the last committed offset.
    fn offset(&self) -> Option<String>;

    /// Records the offset produced by a completed batch.
    async fn commit(&mut self, offset: Option<String>, end_of_data: bool) -> Result<(), OffsetError>;
}

/// A process-local tracker.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOffsetTracker {
    offset: Option<String>,
    finished: bool,
    commits: u64,
}

impl InMemoryOffsetTracker {
    /// Creates a tracker with no committed offset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tracker resuming from `offset`.
    #[must_use]
    pub fn with_offset(offset: impl Into<String>) -> Self {
        Self {
            offset: Some(offset.into()),
            ..Self::default()
        }
    }

    /// Returns the number of commits accepted.
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits
    }
}

#[async_trait]
impl SourceOffsetTracker for InMemoryOffsetTracker {
    async fn is_finished(&self) -> Result<bool, OffsetError> {
        Ok(self.finished)
    }

    fn offset(&self) -> Option<String> {
        self.offset.clone()
    }

    async fn commit(&mut self, offset: Option<String>, end_of_data: bool) -> Result<(), OffsetError> {
        if self.finished {
            return Err(OffsetError::AlreadyFinished {
                offset: self.offset.clone(),
            });
        }
        self.offset = offset;
        self.finished = end_of_data;
        self.commits += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedOffset {
    offset: Option<String>,
    #[serde(default)]
    finished: bool,
    updated_at: DateTime<Utc>,
}

/// A tracker persisted as a small JSON document.
///
/// Every commit writes and syncs a sibling temp file before renaming it over
/// the previous one, so a crash mid-write leaves the previous offset intact.
#[derive(Debug)]
pub struct FileOffsetTracker {
    path: PathBuf,
    state: Option<PersistedOffset>,
}

impl FileOffsetTracker {
    /// Opens the tracker at `path`, loading any previously committed offset.
    ///
    /// A missing file is a fresh start.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, OffsetError> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => Some(
                serde_json::from_slice::<PersistedOffset>(&bytes)
                    .map_err(|e| OffsetError::Corrupt(format!("{}: {e}", path.display())))?,
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        debug!(
            path = %path.display(),
            offset = ?state.as_ref().and_then(|s| s.offset.as_deref()),
            "Opened offset file"
        );

        Ok(Self { path, state })
    }

    /// Returns the file backing this tracker.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns when the offset was last committed.
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.state.as_ref().map(|s| s.updated_at)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SourceOffsetTracker for FileOffsetTracker {
    async fn is_finished(&self) -> Result<bool, OffsetError> {
        Ok(self.state.as_ref().is_some_and(|s| s.finished))
    }

    fn offset(&self) -> Option<String> {
        self.state.as_ref().and_then(|s| s.offset.clone())
    }

    async fn commit(&mut self, offset: Option<String>, end_of_data: bool) -> Result<(), OffsetError> {
        if self.is_finished().await? {
            return Err(OffsetError::AlreadyFinished {
                offset: self.offset(),
            });
        }

        let state = PersistedOffset {
            offset,
            finished: end_of_data,
            updated_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&state)
            .map_err(|e| OffsetError::Corrupt(e.to_string()))?;

        let temp = self.temp_path();
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp, &self.path).await?;

        self.state = Some(state);
        Ok(())
    }
}
