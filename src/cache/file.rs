//! JSON document cache store with write-to-temporary-then-rename commits.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{accept_loaded, CacheStore, SnapshotCell};
use crate::errors::AppError;
use crate::models::DatasetSnapshot;

/// Persists the snapshot as one JSON document on disk.
pub struct JsonFileCacheStore {
    path: PathBuf,
    cell: SnapshotCell,
}

impl JsonFileCacheStore {
    /// Open the store, loading a previously committed snapshot if one is usable.
    pub async fn open(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::CacheUnavailable(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let initial = match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<DatasetSnapshot>(&bytes) {
                Ok(snapshot) => accept_loaded(snapshot, &path.display().to_string()),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                return Err(AppError::CacheUnavailable(format!(
                    "Failed to read cache file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        if let Some(snapshot) = &initial {
            tracing::info!(
                "Loaded cached snapshot with {} records from {}",
                snapshot.len(),
                path.display()
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            cell: SnapshotCell::new(initial),
        })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    async fn persist(&self, snapshot: &DatasetSnapshot) -> Result<(), AppError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.temp_path();

        let written = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AppError::CacheUnavailable(format!(
                "Failed to write temporary cache file {}: {}",
                tmp_path.display(),
                e
            )));
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(AppError::CacheUnavailable(format!(
                "Failed to move {} to {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            )));
        }

        // The rename is committed; a failed directory sync only weakens durability.
        if let Err(e) = sync_parent_dir(&self.path).await {
            tracing::warn!(
                "Failed to sync cache directory for {}: {}",
                self.path.display(),
                e
            );
        }

        Ok(())
    }
}

/// Flush the directory entry of `path` so a completed rename survives power loss.
async fn sync_parent_dir(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tokio::fs::File::open(parent).await?.sync_all().await
}

#[async_trait]
impl CacheStore for JsonFileCacheStore {
    async fn read(&self) -> Result<Option<Arc<DatasetSnapshot>>, AppError> {
        Ok(self.cell.load())
    }

    async fn replace(&self, snapshot: DatasetSnapshot) -> Result<Arc<DatasetSnapshot>, AppError> {
        let _writer = self.cell.begin_write().await;
        self.persist(&snapshot).await?;
        Ok(self.cell.publish(snapshot))
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}
