//! REST API module.
//!
//! Thin handlers over the directory service plus the response envelopes
//! existing clients expect.

mod faculty;

pub use faculty::*;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::directory::FacultyView;
use crate::models::{DatasetSnapshot, DepartmentReport, Source};

/// Serializes a shared snapshot's records without copying them.
#[derive(Debug)]
pub struct Records(Arc<DatasetSnapshot>);

impl Serialize for Records {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.records.serialize(serializer)
    }
}

/// Success envelope for faculty reads and refreshes.
#[derive(Debug, Serialize)]
pub struct FacultyResponse {
    pub status: &'static str,
    pub data: Records,
    pub count: usize,
    pub source: Source,
    pub last_refreshed: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub departments: Option<Vec<DepartmentReport>>,
}

impl From<FacultyView> for FacultyResponse {
    fn from(view: FacultyView) -> Self {
        let count = view.snapshot.len();
        let last_refreshed = view.snapshot.last_refreshed;
        let (message, refresh_id, departments) = match view.refresh {
            Some(summary) => (
                Some(summary.message),
                Some(summary.refresh_id),
                Some(summary.departments),
            ),
            None => (None, None, None),
        };

        Self {
            status: "success",
            data: Records(view.snapshot),
            count,
            source: view.source,
            last_refreshed,
            message,
            refresh_id,
            departments,
        }
    }
}

impl IntoResponse for FacultyResponse {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult = Result<FacultyResponse, crate::errors::AppError>;

/// Liveness envelope; independent of cache state.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}
