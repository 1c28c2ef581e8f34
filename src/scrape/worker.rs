//! Department worker: fetch one listing, parse it, enrich entries from profiles.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use super::parser::{self, ListingEntry};
use super::PageFetcher;
use crate::errors::{DepartmentFailure, FetchCause, FetchError};
use crate::models::{Department, FacultyEntry};

/// Base delay between listing fetch attempts; multiplied by the attempt number.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Wall-clock allowance for one department when none is configured.
pub const DEFAULT_TIME_BUDGET: Duration = Duration::from_secs(30);

/// Records one department contributed to a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentHarvest {
    pub department: String,
    pub entries: Vec<FacultyEntry>,
    /// Listing blocks dropped as unparseable
    pub skipped_blocks: usize,
    /// Entries left without profile details because the time budget ran out
    pub profiles_skipped: usize,
}

/// Fetch-and-parse unit for a single department.
pub struct DepartmentWorker {
    fetcher: Arc<dyn PageFetcher>,
    retries: u32,
    retry_backoff: Duration,
    time_budget: Duration,
    fetch_profiles: bool,
}

impl DepartmentWorker {
    pub fn new(fetcher: Arc<dyn PageFetcher>, retries: u32, fetch_profiles: bool) -> Self {
        Self {
            fetcher,
            retries,
            retry_backoff: RETRY_BACKOFF,
            time_budget: DEFAULT_TIME_BUDGET,
            fetch_profiles,
        }
    }

    /// Cap the time one department may take, counted from when its run starts.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = budget;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Scrape one department. A failure here only costs this department's records.
    ///
    /// The listing must arrive within the time budget or the department fails.
    /// Profile enrichment stops at the budget and the remaining entries are
    /// kept as listed.
    pub async fn run(&self, department: &Department) -> Result<DepartmentHarvest, DepartmentFailure> {
        let deadline = Instant::now() + self.time_budget;

        let (markup, attempts) = self
            .fetch_listing(department, deadline)
            .await
            .map_err(|(cause, attempts)| DepartmentFailure {
                department: department.code.clone(),
                cause,
                attempts,
            })?;
        tracing::debug!(
            "Fetched listing for {} ({} bytes, attempt {})",
            department.code,
            markup.len(),
            attempts
        );

        let parsed = parser::parse_listing(&department.code, &department.url, &markup);
        for anomaly in &parsed.anomalies {
            tracing::debug!(
                "Skipped block {} in {}: {}",
                anomaly.index,
                anomaly.department,
                anomaly.reason
            );
        }

        let mut entries = Vec::with_capacity(parsed.entries.len());
        let mut profiles_skipped = 0;
        for listed in parsed.entries {
            let (entry, enriched) = self.enrich(&department.code, listed, deadline).await;
            if !enriched {
                profiles_skipped += 1;
            }
            entries.push(entry);
        }
        if profiles_skipped > 0 {
            tracing::warn!(
                "Time budget of {:?} ran out for {}; {} entries kept without profile details",
                self.time_budget,
                department.code,
                profiles_skipped
            );
        }

        Ok(DepartmentHarvest {
            department: department.code.clone(),
            entries,
            skipped_blocks: parsed.anomalies.len(),
            profiles_skipped,
        })
    }

    async fn fetch_listing(
        &self,
        department: &Department,
        deadline: Instant,
    ) -> Result<(String, u32), (FetchError, u32)> {
        let mut attempt = 1;
        loop {
            let fetched = timeout_at(deadline, self.fetcher.fetch(&department.code, &department.url))
                .await
                .unwrap_or_else(|_| {
                    Err(FetchError {
                        department: department.code.clone(),
                        url: department.url.clone(),
                        cause: FetchCause::Timeout,
                    })
                });
            let backoff = self.retry_backoff * attempt;

            match fetched {
                Ok(markup) => return Ok((markup, attempt)),
                Err(err)
                    if attempt <= self.retries
                        && err.cause.is_transient()
                        && Instant::now() + backoff < deadline =>
                {
                    tracing::warn!(
                        "Listing fetch for {} failed (attempt {}): {}; retrying",
                        department.code,
                        attempt,
                        err.cause
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err((err, attempt)),
            }
        }
    }

    /// Fill contact details from the profile page; on any failure keep the entry as listed.
    ///
    /// The flag is false only when the deadline cut enrichment short.
    async fn enrich(
        &self,
        department: &str,
        listed: ListingEntry,
        deadline: Instant,
    ) -> (FacultyEntry, bool) {
        let ListingEntry { entry, profile_url } = listed;
        let Some(url) = profile_url.filter(|_| self.fetch_profiles) else {
            return (entry, true);
        };
        if Instant::now() >= deadline {
            return (entry, false);
        }

        match timeout_at(deadline, self.fetcher.fetch(department, &url)).await {
            Ok(Ok(markup)) => (entry.with_profile(parser::parse_profile(&markup)), true),
            Ok(Err(err)) => {
                tracing::debug!("Profile fetch failed for {}: {}", entry.name, err);
                (entry, true)
            }
            Err(_) => {
                tracing::debug!("Profile fetch for {} abandoned at the time budget", entry.name);
                (entry, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchCause;
    use crate::scrape::fixtures::{listing_page, profile_page, Card, FixtureFetcher};

    const LISTING: &str = "http://site.test/dept/cse/faculty";

    fn department() -> Department {
        Department::new("cse", LISTING)
    }

    fn worker(fetcher: Arc<FixtureFetcher>, retries: u32, profiles: bool) -> DepartmentWorker {
        DepartmentWorker::new(fetcher, retries, profiles).with_retry_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_run_enriches_from_profile_pages() {
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .page(
                    LISTING,
                    listing_page(&[
                        Card::new("Dr. Asha Rao", "Professor").link("/people/asha"),
                        Card::new("Dr. Vikram Sen", "Lecturer").link("/people/vikram"),
                    ]),
                )
                .page(
                    "http://site.test/people/asha",
                    profile_page("Mobile 9876543210", "asha@site.test", "Networks"),
                )
                .failing("http://site.test/people/vikram", FetchCause::Timeout),
        );

        let harvest = worker(fetcher.clone(), 0, true).run(&department()).await.unwrap();

        assert_eq!(harvest.department, "cse");
        assert_eq!(harvest.entries.len(), 2);
        assert_eq!(harvest.entries[0].email.as_deref(), Some("asha@site.test"));
        assert_eq!(harvest.entries[0].number.as_deref(), Some("9876543210"));
        assert_eq!(harvest.entries[0].areas_of_interest.as_deref(), Some("Networks"));
        assert_eq!(harvest.entries[1].name, "Dr. Vikram Sen");
        assert!(harvest.entries[1].email.is_none());
        assert_eq!(fetcher.calls_to("http://site.test/people/vikram"), 1);
    }

    #[tokio::test]
    async fn test_profiles_skipped_when_disabled() {
        let fetcher = Arc::new(FixtureFetcher::new().page(
            LISTING,
            listing_page(&[Card::new("Dr. Asha Rao", "Professor").link("/people/asha")]),
        ));

        let harvest = worker(fetcher.clone(), 0, false).run(&department()).await.unwrap();

        assert_eq!(harvest.entries.len(), 1);
        assert_eq!(fetcher.calls_to("http://site.test/people/asha"), 0);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let fetcher = Arc::new(FixtureFetcher::new().failing(LISTING, FetchCause::Status(503)));

        let failure = worker(fetcher.clone(), 2, false).run(&department()).await.unwrap_err();

        assert_eq!(failure.department, "cse");
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.cause.cause, FetchCause::Status(503));
        assert_eq!(fetcher.calls_to(LISTING), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let fetcher = Arc::new(FixtureFetcher::new());

        let failure = worker(fetcher.clone(), 3, false).run(&department()).await.unwrap_err();

        assert_eq!(failure.attempts, 1);
        assert_eq!(failure.cause.cause, FetchCause::Status(404));
        assert_eq!(fetcher.calls_to(LISTING), 1);
    }

    #[tokio::test]
    async fn test_skipped_blocks_are_counted() {
        let markup = r#"
            <div class="well"><h5 class="media-heading">Kept</h5></div>
            <div class="well"><p>broken</p></div>
        "#;
        let fetcher = Arc::new(FixtureFetcher::new().page(LISTING, markup));

        let harvest = worker(fetcher, 0, true).run(&department()).await.unwrap();

        assert_eq!(harvest.entries.len(), 1);
        assert_eq!(harvest.skipped_blocks, 1);
    }

    #[tokio::test]
    async fn test_slow_listing_fails_department_at_time_budget() {
        let fetcher = Arc::new(
            FixtureFetcher::new()
                .page(LISTING, listing_page(&[Card::new("Late", "Professor")]))
                .delayed(LISTING, Duration::from_secs(5)),
        );

        let started = std::time::Instant::now();
        let failure = worker(fetcher, 2, false)
            .with_time_budget(Duration::from_millis(100))
            .run(&department())
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(failure.cause.cause, FetchCause::Timeout);
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn test_slow_profiles_keep_listing_entries() {
        let cards: Vec<Card> = (0..3)
            .map(|i| Card::new(&format!("Member {}", i), "Professor").link(&format!("/people/{}", i)))
            .collect();
        let mut fetcher = FixtureFetcher::new().page(LISTING, listing_page(&cards));
        for i in 0..3 {
            let profile = format!("http://site.test/people/{}", i);
            fetcher = fetcher
                .page(&profile, profile_page("9876543210", "m@site.test", "Optics"))
                .delayed(&profile, Duration::from_millis(150));
        }

        let harvest = worker(Arc::new(fetcher), 0, true)
            .with_time_budget(Duration::from_millis(100))
            .run(&department())
            .await
            .unwrap();

        let names: Vec<_> = harvest.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Member 0", "Member 1", "Member 2"]);
        assert!(harvest.entries.iter().all(|e| e.email.is_none()));
        assert_eq!(harvest.profiles_skipped, 3);
    }
}
