//! Error handling module for the faculty directory.
//!
//! Boundary errors map to HTTP status codes and the error envelope. Per-department
//! and per-block errors are plain values absorbed inside the refresh pipeline.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NO_DATA: &str = "NO_DATA";
    pub const REFRESH_IN_PROGRESS: &str = "REFRESH_IN_PROGRESS";
    pub const PIPELINE_FAILURE: &str = "PIPELINE_FAILURE";
    pub const REFRESH_TIMEOUT: &str = "REFRESH_TIMEOUT";
    pub const CACHE_UNAVAILABLE: &str = "CACHE_UNAVAILABLE";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Nothing has been committed to the cache yet
    NoData,
    /// Another refresh holds the refresh guard
    RefreshInProgress,
    /// Every department failed in one refresh
    Pipeline(String),
    /// The scrape phase exceeded its ceiling
    RefreshTimeout(Duration),
    /// The cache store cannot be read or written
    CacheUnavailable(String),
    /// Invalid configuration
    Config(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NoData => StatusCode::NOT_FOUND,
            AppError::RefreshInProgress => StatusCode::CONFLICT,
            AppError::Pipeline(_) => StatusCode::BAD_GATEWAY,
            AppError::RefreshTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NoData => codes::NO_DATA,
            AppError::RefreshInProgress => codes::REFRESH_IN_PROGRESS,
            AppError::Pipeline(_) => codes::PIPELINE_FAILURE,
            AppError::RefreshTimeout(_) => codes::REFRESH_TIMEOUT,
            AppError::CacheUnavailable(_) => codes::CACHE_UNAVAILABLE,
            AppError::Config(_) => codes::CONFIG_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NoData => {
                "No faculty data available yet; trigger a refresh first".to_string()
            }
            AppError::RefreshInProgress => "A refresh is already in progress".to_string(),
            AppError::Pipeline(msg) => msg.clone(),
            AppError::RefreshTimeout(limit) => {
                format!("Refresh did not finish within {:?}; cache left unchanged", limit)
            }
            AppError::CacheUnavailable(msg) => msg.clone(),
            AppError::Config(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Cache database error: {:?}", err);
        AppError::CacheUnavailable(format!("Cache database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("Snapshot encoding error: {:?}", err);
        AppError::CacheUnavailable(format!("Snapshot encoding error: {}", err))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        tracing::error!("Refresh task failed: {:?}", err);
        AppError::Internal(format!("Refresh task failed: {}", err))
    }
}

/// Why a single page could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// Connection, DNS or TLS failure
    Network(String),
    /// Connect or request timeout elapsed
    Timeout,
    /// Server answered with a non-success status
    Status(u16),
    /// Body could not be read or decoded
    Body(String),
}

impl FetchCause {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchCause::Status(code) => *code >= 500 || *code == 429,
            _ => true,
        }
    }
}

impl std::fmt::Display for FetchCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchCause::Network(msg) => write!(f, "network error: {}", msg),
            FetchCause::Timeout => write!(f, "timed out"),
            FetchCause::Status(code) => write!(f, "HTTP status {}", code),
            FetchCause::Body(msg) => write!(f, "unreadable body: {}", msg),
        }
    }
}

/// A page of one department could not be retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub department: String,
    pub url: String,
    pub cause: FetchCause,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.department, self.url, self.cause)
    }
}

impl std::error::Error for FetchError {}

/// A department contributed no records because its listing was unreachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepartmentFailure {
    pub department: String,
    pub cause: FetchError,
    pub attempts: u32,
}

impl std::fmt::Display for DepartmentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "department {} failed after {} attempt(s): {}",
            self.department, self.attempts, self.cause.cause
        )
    }
}

impl std::error::Error for DepartmentFailure {}

/// One entry block that could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAnomaly {
    pub department: String,
    /// Position of the block among the page's entry blocks
    pub index: usize,
    pub reason: &'static str,
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let message = error.message();
        Self {
            status: "error".to_string(),
            message: message.clone(),
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
