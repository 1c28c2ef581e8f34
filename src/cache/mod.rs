//! Snapshot cache stores.
//!
//! Every store keeps the last committed snapshot behind an `Arc` pointer. Reads
//! clone the pointer and never touch storage; `replace` holds a writer lock,
//! persists the new snapshot, then swaps the pointer.

mod file;
mod memory;
mod sqlite;

pub use file::*;
pub use memory::*;
pub use sqlite::*;

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::{CacheBackend, Config};
use crate::errors::AppError;
use crate::models::{DatasetSnapshot, SNAPSHOT_SCHEMA_VERSION};

/// Holder of the committed dataset snapshot.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The most recently committed snapshot, or `None` if nothing was ever committed.
    async fn read(&self) -> Result<Option<Arc<DatasetSnapshot>>, AppError>;

    /// Atomically replace the committed snapshot. Calls are serialised.
    async fn replace(&self, snapshot: DatasetSnapshot) -> Result<Arc<DatasetSnapshot>, AppError>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Committed-snapshot pointer plus the single-writer lock shared by all stores.
pub struct SnapshotCell {
    current: RwLock<Option<Arc<DatasetSnapshot>>>,
    writer: Mutex<()>,
}

impl SnapshotCell {
    pub fn new(initial: Option<DatasetSnapshot>) -> Self {
        Self {
            current: RwLock::new(initial.map(Arc::new)),
            writer: Mutex::new(()),
        }
    }

    pub fn load(&self) -> Option<Arc<DatasetSnapshot>> {
        // The guarded value is a pointer swap, so a poisoned lock still holds a whole snapshot.
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Wait for exclusive write access. Hold the guard across persist and publish.
    pub async fn begin_write(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    pub fn publish(&self, snapshot: DatasetSnapshot) -> Arc<DatasetSnapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Arc::clone(&snapshot));
        snapshot
    }
}

/// Validate a snapshot loaded from storage; anything unusable is treated as absent.
fn accept_loaded(snapshot: DatasetSnapshot, origin: &str) -> Option<DatasetSnapshot> {
    if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
        tracing::warn!(
            "Ignoring cached snapshot in {}: schema version {} (expected {})",
            origin,
            snapshot.schema_version,
            SNAPSHOT_SCHEMA_VERSION
        );
        return None;
    }
    if !snapshot.has_contiguous_ids() {
        tracing::warn!("Ignoring cached snapshot in {}: ids are not contiguous", origin);
        return None;
    }
    Some(snapshot)
}

/// Open the store selected by configuration.
pub async fn open_store(config: &Config) -> Result<Arc<dyn CacheStore>, AppError> {
    let store: Arc<dyn CacheStore> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
        CacheBackend::Json => Arc::new(JsonFileCacheStore::open(&config.cache_path).await?),
        CacheBackend::Sqlite => Arc::new(SqliteCacheStore::open(&config.cache_path).await?),
    };
    Ok(store)
}
