//! Directory service: the cached read path and the live refresh path.
//!
//! Owns no scraping logic. A refresh scrapes through the coordinator and, on
//! success, commits the snapshot through the injected cache store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::errors::AppError;
use crate::models::{DatasetSnapshot, Department, DepartmentReport, Source};
use crate::scrape::ScrapeCoordinator;

/// Extra detail attached to a live response.
#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub refresh_id: Uuid,
    pub message: String,
    pub departments: Vec<DepartmentReport>,
}

/// A snapshot as served to a caller.
#[derive(Debug, Clone)]
pub struct FacultyView {
    pub snapshot: Arc<DatasetSnapshot>,
    pub source: Source,
    pub refresh: Option<RefreshSummary>,
}

pub struct DirectoryService {
    coordinator: ScrapeCoordinator,
    cache: Arc<dyn CacheStore>,
    departments: Vec<Department>,
    refresh_timeout: Duration,
    refresh_guard: Arc<Mutex<()>>,
}

impl DirectoryService {
    pub fn new(
        coordinator: ScrapeCoordinator,
        cache: Arc<dyn CacheStore>,
        departments: Vec<Department>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            coordinator,
            cache,
            departments,
            refresh_timeout,
            refresh_guard: Arc::new(Mutex::new(())),
        }
    }

    /// Serve the last committed snapshot without touching the remote site.
    pub async fn get_cached(&self) -> Result<FacultyView, AppError> {
        match self.cache.read().await? {
            Some(snapshot) => Ok(FacultyView {
                snapshot,
                source: Source::Cache,
                refresh: None,
            }),
            None => Err(AppError::NoData),
        }
    }

    /// Scrape all departments now and commit the result.
    ///
    /// Overlapping calls are rejected with `RefreshInProgress`. The work runs
    /// on its own task, so a caller that goes away does not interrupt a commit.
    pub async fn refresh_now(self: &Arc<Self>) -> Result<FacultyView, AppError> {
        let guard = Arc::clone(&self.refresh_guard)
            .try_lock_owned()
            .map_err(|_| AppError::RefreshInProgress)?;

        let service = Arc::clone(self);
        let task = tokio::spawn(async move {
            let _guard = guard;
            service.run_refresh().await
        });
        task.await?
    }

    async fn run_refresh(&self) -> Result<FacultyView, AppError> {
        let refresh_id = Uuid::new_v4();
        tracing::info!(
            "Refresh {} started for {} departments",
            refresh_id,
            self.departments.len()
        );

        let scrape = self.coordinator.refresh(&self.departments);
        let outcome = match tokio::time::timeout(self.refresh_timeout, scrape).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!("Refresh {} failed: {}", refresh_id, e);
                return Err(e);
            }
            Err(_) => {
                tracing::warn!(
                    "Refresh {} abandoned after {:?}; cache unchanged",
                    refresh_id,
                    self.refresh_timeout
                );
                return Err(AppError::RefreshTimeout(self.refresh_timeout));
            }
        };

        let message = outcome.summary();
        let snapshot = self.cache.replace(outcome.snapshot).await?;
        tracing::info!(
            "Refresh {} committed to {}: {}",
            refresh_id,
            self.cache.describe(),
            message
        );

        Ok(FacultyView {
            snapshot,
            source: Source::Live,
            refresh: Some(RefreshSummary {
                refresh_id,
                message,
                departments: outcome.departments,
            }),
        })
    }
}
