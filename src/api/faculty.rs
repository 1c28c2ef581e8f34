//! Faculty API endpoints.

use axum::extract::State;

use super::{ApiResult, FacultyResponse};
use crate::AppState;

/// GET /api/faculty - Serve the cached snapshot.
pub async fn get_faculty(State(state): State<AppState>) -> ApiResult {
    let view = state.directory.get_cached().await?;
    Ok(FacultyResponse::from(view))
}

/// POST /api/faculty/refresh - Scrape now, commit, and return the fresh snapshot.
pub async fn refresh_faculty(State(state): State<AppState>) -> ApiResult {
    match state.directory.refresh_now().await {
        Ok(view) => Ok(FacultyResponse::from(view)),
        Err(e) => {
            tracing::warn!("Refresh request failed: {}", e);
            Err(e)
        }
    }
}
