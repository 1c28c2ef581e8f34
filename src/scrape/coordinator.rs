//! Parallel scrape coordinator.
//!
//! Workers run on a `JoinSet` gated by a semaphore, so at most `max_concurrency`
//! departments are fetched at once however many are configured. Results are
//! slotted back by enumeration position before merging, which makes ids
//! independent of completion order.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{DepartmentHarvest, DepartmentWorker};
use crate::errors::{AppError, DepartmentFailure};
use crate::models::{
    DatasetSnapshot, Department, DepartmentReport, DepartmentStatus, FacultyRecord, RefreshOutcome,
};

/// A worker's result, or `None` if its task died before reporting.
pub type WorkerResult = Option<Result<DepartmentHarvest, DepartmentFailure>>;

/// Fans department workers out over a bounded pool and merges their output.
pub struct ScrapeCoordinator {
    worker: Arc<DepartmentWorker>,
    max_concurrency: usize,
}

impl ScrapeCoordinator {
    pub fn new(worker: DepartmentWorker, max_concurrency: usize) -> Self {
        Self {
            worker: Arc::new(worker),
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Scrape every department and build a fresh snapshot.
    ///
    /// Waits for all workers. Fails only when no department could be fetched.
    /// Dropping the returned future aborts any workers still running.
    pub async fn refresh(&self, departments: &[Department]) -> Result<RefreshOutcome, AppError> {
        if departments.is_empty() {
            return Err(AppError::Pipeline("No departments configured".to_string()));
        }

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, department) in departments.iter().cloned().enumerate() {
            let worker = Arc::clone(&self.worker);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = permits.acquire_owned().await.ok();
                (index, worker.run(&department).await)
            });
        }

        let mut results: Vec<WorkerResult> = (0..departments.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(err) => tracing::warn!("Department worker task failed: {}", err),
            }
        }

        let (records, reports) = merge_departments(departments, results);

        if reports.iter().all(|r| r.status == DepartmentStatus::Failed) {
            return Err(AppError::Pipeline(format!(
                "All {} departments failed to fetch",
                departments.len()
            )));
        }

        Ok(RefreshOutcome {
            snapshot: DatasetSnapshot::new(records, Utc::now()),
            departments: reports,
        })
    }
}

/// Concatenate harvests in enumeration order and number records `0..N`.
pub fn merge_departments(
    departments: &[Department],
    results: Vec<WorkerResult>,
) -> (Vec<FacultyRecord>, Vec<DepartmentReport>) {
    let mut records = Vec::new();
    let mut reports = Vec::with_capacity(departments.len());

    for (department, result) in departments.iter().zip(results) {
        match result {
            Some(Ok(harvest)) => {
                tracing::info!(
                    "Department {}: {} records ({} blocks skipped, {} without profile details)",
                    department.code,
                    harvest.entries.len(),
                    harvest.skipped_blocks,
                    harvest.profiles_skipped
                );
                reports.push(DepartmentReport {
                    department: department.code.clone(),
                    status: DepartmentStatus::Ok,
                    count: harvest.entries.len(),
                    skipped_blocks: harvest.skipped_blocks,
                    error: None,
                });
                for entry in harvest.entries {
                    let id = records.len();
                    records.push(entry.into_record(id));
                }
            }
            Some(Err(failure)) => {
                tracing::warn!("Department {} contributed no records: {}", department.code, failure);
                reports.push(failed_report(department, failure.to_string()));
            }
            None => {
                reports.push(failed_report(department, "worker task aborted".to_string()));
            }
        }
    }

    (records, reports)
}

fn failed_report(department: &Department, error: String) -> DepartmentReport {
    DepartmentReport {
        department: department.code.clone(),
        status: DepartmentStatus::Failed,
        count: 0,
        skipped_blocks: 0,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::errors::FetchCause;
    use crate::scrape::fixtures::{listing_page, Card, FixtureFetcher};

    fn url(code: &str) -> String {
        format!("http://site.test/dept/{}/faculty", code)
    }

    fn departments(codes: &[&str]) -> Vec<Department> {
        codes.iter().map(|c| Department::new(*c, url(c))).collect()
    }

    fn cards(prefix: &str, n: usize) -> String {
        let cards: Vec<Card> = (0..n)
            .map(|i| Card::new(&format!("{} Member {}", prefix, i), "Professor"))
            .collect();
        listing_page(&cards)
    }

    fn coordinator(fetcher: Arc<FixtureFetcher>, max_concurrency: usize) -> ScrapeCoordinator {
        let worker = DepartmentWorker::new(fetcher, 0, false).with_retry_backoff(Duration::ZERO);
        ScrapeCoordinator::new(worker, max_concurrency)
    }

    #[tokio::test]
    async fn test_ids_follow_enumeration_order_with_empty_department() {
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .page(&url("d1"), cards("D1", 2))
                .page(&url("d2"), cards("D2", 0))
                .page(&url("d3"), cards("D3", 3)),
        );

        let outcome = coordinator(fetcher, 5)
            .refresh(&departments(&["d1", "d2", "d3"]))
            .await
            .unwrap();

        let records = &outcome.snapshot.records;
        assert_eq!(records.len(), 5);
        assert!(outcome.snapshot.has_contiguous_ids());
        let depts: Vec<_> = records.iter().map(|r| r.department.as_str()).collect();
        assert_eq!(depts, vec!["d1", "d1", "d3", "d3", "d3"]);
        assert_eq!(records[2].name, "D3 Member 0");

        let d2 = &outcome.departments[1];
        assert_eq!(d2.status, DepartmentStatus::Ok);
        assert_eq!(d2.count, 0);
    }

    #[tokio::test]
    async fn test_completion_order_does_not_change_result() {
        let build = |slow: &str| {
            Arc::new(
                FixtureFetcher::new()
                    .page(&url("a"), cards("A", 2))
                    .page(&url("b"), cards("B", 1))
                    .page(&url("c"), cards("C", 2))
                    .delayed(&url(slow), Duration::from_millis(40)),
            )
        };
        let depts = departments(&["a", "b", "c"]);

        let first = coordinator(build("a"), 3).refresh(&depts).await.unwrap();
        let second = coordinator(build("c"), 3).refresh(&depts).await.unwrap();

        assert_eq!(first.snapshot.records, second.snapshot.records);
        assert_eq!(
            serde_json::to_string(&first.snapshot.records).unwrap(),
            serde_json::to_string(&second.snapshot.records).unwrap()
        );
    }

    #[tokio::test]
    async fn test_partial_failure_is_success() {
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .page(&url("ece"), cards("E", 2))
                .failing(&url("cse"), FetchCause::Network("connection refused".into()))
                .page(&url("mech"), cards("M", 1)),
        );

        let outcome = coordinator(fetcher, 2)
            .refresh(&departments(&["ece", "cse", "mech"]))
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.len(), 3);
        assert!(outcome.snapshot.records.iter().all(|r| r.department != "cse"));
        let failed: Vec<_> = outcome.failed_departments().map(|d| d.department.as_str()).collect();
        assert_eq!(failed, vec!["cse"]);
        assert!(outcome.departments[1].error.is_some());
    }

    #[tokio::test]
    async fn test_total_failure_is_pipeline_error() {
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .failing(&url("ece"), FetchCause::Timeout)
                .failing(&url("cse"), FetchCause::Status(500)),
        );

        let result = coordinator(fetcher, 2)
            .refresh(&departments(&["ece", "cse"]))
            .await;

        assert!(matches!(result, Err(AppError::Pipeline(_))));
    }

    #[tokio::test]
    async fn test_no_departments_is_pipeline_error() {
        let result = coordinator(Arc::new(FixtureFetcher::new()), 2).refresh(&[]).await;
        assert!(matches!(result, Err(AppError::Pipeline(_))));
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrent_fetches() {
        let codes = ["a", "b", "c", "d", "e", "f", "g"];
        let mut fetcher = FixtureFetcher::new();
        for code in codes {
            fetcher = fetcher
                .page(&url(code), cards(code, 1))
                .delayed(&url(code), Duration::from_millis(20));
        }
        let fetcher = Arc::new(fetcher);

        let outcome = coordinator(fetcher.clone(), 2)
            .refresh(&departments(&codes))
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.len(), codes.len());
        assert!(fetcher.peak_in_flight() <= 2);
        assert!(fetcher.peak_in_flight() >= 1);
    }

    #[test]
    fn test_merge_treats_missing_result_as_failure() {
        let depts = departments(&["x", "y"]);
        let harvest = DepartmentHarvest {
            department: "y".into(),
            entries: crate::scrape::parser::parse_listing("y", &url("y"), &cards("Y", 1))
                .entries
                .into_iter()
                .map(|listed| listed.entry)
                .collect(),
            skipped_blocks: 0,
            profiles_skipped: 0,
        };

        let (records, reports) = merge_departments(&depts, vec![None, Some(Ok(harvest))]);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 0);
        assert_eq!(reports[0].status, DepartmentStatus::Failed);
        assert_eq!(reports[0].error.as_deref(), Some("worker task aborted"));
    }
}
