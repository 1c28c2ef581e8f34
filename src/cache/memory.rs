//! Process-local cache store.

use std::sync::Arc;

use async_trait::async_trait;

use super::{CacheStore, SnapshotCell};
use crate::errors::AppError;
use crate::models::DatasetSnapshot;

/// Keeps the snapshot in memory only; lost on restart.
pub struct MemoryCacheStore {
    cell: SnapshotCell,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            cell: SnapshotCell::new(None),
        }
    }

    pub fn with_snapshot(snapshot: DatasetSnapshot) -> Self {
        Self {
            cell: SnapshotCell::new(Some(snapshot)),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn read(&self) -> Result<Option<Arc<DatasetSnapshot>>, AppError> {
        Ok(self.cell.load())
    }

    async fn replace(&self, snapshot: DatasetSnapshot) -> Result<Arc<DatasetSnapshot>, AppError> {
        let _writer = self.cell.begin_write().await;
        Ok(self.cell.publish(snapshot))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
