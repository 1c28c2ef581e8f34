//! Dataset snapshot and refresh reporting models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FacultyRecord;

/// Version of the persisted snapshot document.
pub const SNAPSHOT_SCHEMA_VERSION: i32 = 1;

/// One complete dataset produced by a refresh. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    pub schema_version: i32,
    pub last_refreshed: DateTime<Utc>,
    pub records: Vec<FacultyRecord>,
}

impl DatasetSnapshot {
    pub fn new(records: Vec<FacultyRecord>, last_refreshed: DateTime<Utc>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            last_refreshed,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when ids run 0..len in order with no gaps.
    pub fn has_contiguous_ids(&self) -> bool {
        self.records.iter().enumerate().all(|(i, r)| r.id == i)
    }
}

/// Where a response's dataset came from. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Live,
}

/// Outcome of one department in one refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepartmentStatus {
    Ok,
    Failed,
}

/// Per-department line of a refresh summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentReport {
    pub department: String,
    pub status: DepartmentStatus,
    pub count: usize,
    pub skipped_blocks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A successful refresh: the new snapshot plus how each department fared.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub snapshot: DatasetSnapshot,
    pub departments: Vec<DepartmentReport>,
}

impl RefreshOutcome {
    pub fn failed_departments(&self) -> impl Iterator<Item = &DepartmentReport> {
        self.departments
            .iter()
            .filter(|d| d.status == DepartmentStatus::Failed)
    }

    /// Human-readable one-line summary.
    pub fn summary(&self) -> String {
        let failed: Vec<&str> = self
            .failed_departments()
            .map(|d| d.department.as_str())
            .collect();
        let ok = self.departments.len() - failed.len();

        if failed.is_empty() {
            format!(
                "Refreshed {} faculty records from {} departments",
                self.snapshot.len(),
                ok
            )
        } else {
            format!(
                "Refreshed {} faculty records from {} of {} departments (failed: {})",
                self.snapshot.len(),
                ok,
                self.departments.len(),
                failed.join(", ")
            )
        }
    }
}
