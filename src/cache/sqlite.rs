//! SQLite-backed cache store.
//!
//! The snapshot document lives in a single-row table and is replaced in one
//! transaction, so a crash mid-commit leaves the previous row intact.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::{accept_loaded, CacheStore, SnapshotCell};
use crate::errors::AppError;
use crate::models::DatasetSnapshot;

/// Persists the snapshot document in a SQLite database.
pub struct SqliteCacheStore {
    pool: SqlitePool,
    cell: SnapshotCell,
}

impl SqliteCacheStore {
    /// Open (or create) the database and load the committed snapshot.
    pub async fn open(db_path: &Path) -> Result<Self, AppError> {
        let pool = init_database(db_path).await?;

        let row = sqlx::query("SELECT payload FROM snapshot WHERE id = 1")
            .fetch_optional(&pool)
            .await?;

        let initial = match row {
            Some(row) => {
                let payload: String = row.get("payload");
                match serde_json::from_str::<DatasetSnapshot>(&payload) {
                    Ok(snapshot) => accept_loaded(snapshot, &db_path.display().to_string()),
                    Err(e) => {
                        tracing::warn!(
                            "Ignoring unreadable snapshot row in {}: {}",
                            db_path.display(),
                            e
                        );
                        None
                    }
                }
            }
            None => None,
        };

        if let Some(snapshot) = &initial {
            tracing::info!(
                "Loaded cached snapshot with {} records from {}",
                snapshot.len(),
                db_path.display()
            );
        }

        Ok(Self {
            pool,
            cell: SnapshotCell::new(initial),
        })
    }

    async fn persist(&self, snapshot: &DatasetSnapshot) -> Result<(), AppError> {
        let payload = serde_json::to_string(snapshot)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT OR REPLACE INTO snapshot (id, schema_version, last_refreshed, record_count, payload) VALUES (1, ?, ?, ?, ?)",
        )
        .bind(snapshot.schema_version)
        .bind(snapshot.last_refreshed.to_rfc3339())
        .bind(snapshot.len() as i64)
        .bind(&payload)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn read(&self) -> Result<Option<Arc<DatasetSnapshot>>, AppError> {
        Ok(self.cell.load())
    }

    async fn replace(&self, snapshot: DatasetSnapshot) -> Result<Arc<DatasetSnapshot>, AppError> {
        let _writer = self.cell.begin_write().await;
        self.persist(&snapshot).await?;
        Ok(self.cell.publish(snapshot))
    }

    fn describe(&self) -> String {
        "sqlite".to_string()
    }
}

/// Initialize the database connection pool and run migrations.
async fn init_database(db_path: &Path) -> Result<SqlitePool, AppError> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            AppError::CacheUnavailable(format!(
                "Failed to create cache directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshot (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL,
            last_refreshed TEXT NOT NULL,
            record_count INTEGER NOT NULL,
            payload TEXT NOT NULL
        );
        "#,
    )
    .execute(&pool)
    .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::snapshot_of;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sqlite_round_trip_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.sqlite");

        let store = SqliteCacheStore::open(&db_path).await.unwrap();
        assert!(store.read().await.unwrap().is_none());

        store.replace(snapshot_of("ece", 4)).await.unwrap();
        store.replace(snapshot_of("cse", 2)).await.unwrap();
        drop(store);

        let reopened = SqliteCacheStore::open(&db_path).await.unwrap();
        let loaded = reopened.read().await.unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.records[0].department, "cse");
        assert!(loaded.has_contiguous_ids());

        let rows: i64 = sqlx::query("SELECT COUNT(*) AS n FROM snapshot")
            .fetch_one(&reopened.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(rows, 1);
    }
}
