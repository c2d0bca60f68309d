//! File-backed storage units
//!
//! Directory layout:
//! ```text
//! ~/.memolog/
//! ├── memos.md
//! └── journal/
//!     └── 2025.md
//! ```
//!
//! A unit id is a relative path under the root. Writes go to a sibling
//! temporary file first and are renamed into place.

use super::{StorageBackend, UnitGuard, UnitLocks};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Storage backend over plain files
#[derive(Debug)]
pub struct FsBackend {
    root: PathBuf,
    locks: UnitLocks,
}

impl FsBackend {
    /// Create a backend rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: UnitLocks::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a unit id to its file, rejecting ids that escape the root.
    pub fn unit_path(&self, unit_id: &str) -> Result<PathBuf> {
        let relative = Path::new(unit_id);
        let escapes = unit_id.trim().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(Error::invalid_state(format!(
                "storage unit '{}' must be a relative path inside {}",
                unit_id,
                self.root.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StorageBackend for FsBackend {
    async fn read_buffer(&self, unit_id: &str) -> Result<String> {
        let path = self.unit_path(unit_id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    async fn write_buffer(&self, unit_id: &str, text: &str) -> Result<()> {
        let path = self.unit_path(unit_id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Internal(format!("no file name in {}", path.display())))?;
        let staging = path.with_file_name(format!(".{}.tmp", file_name));

        if let Err(e) = tokio::fs::write(&staging, text).await {
            tracing::warn!("Failed to write {}: {}", staging.display(), e);
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            tracing::warn!("Failed to replace {}: {}", path.display(), e);
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!("Wrote {} bytes to {}", text.len(), path.display());
        Ok(())
    }

    async fn exists(&self, unit_id: &str) -> bool {
        match self.unit_path(unit_id) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn modification_time(&self, unit_id: &str) -> Option<SystemTime> {
        let path = self.unit_path(unit_id).ok()?;
        tokio::fs::metadata(&path).await.ok()?.modified().ok()
    }

    async fn lock(&self, unit_id: &str) -> UnitGuard {
        self.locks.acquire(unit_id).await
    }

    fn name(&self) -> &str {
        "fs"
    }
}
