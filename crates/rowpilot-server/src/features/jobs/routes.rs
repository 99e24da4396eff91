//! Job routes
//!
//! `/start_job` and `/status/:job_id` answer with bare JSON objects, the shape
//! the upload page polls. `/jobs` uses the standard response envelope.

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;

use super::commands::start_job;
use super::queries::{
    download_report, get_status, list_jobs, DownloadReportQuery, GetStatusQuery,
};
use crate::api::response::ApiResponse;
use crate::error::{AppError, AppResult};
use crate::features::FeatureState;
use crate::session::SessionId;

/// Create job routes
pub fn jobs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/start_job", post(start))
        .route("/status/:job_id", get(status))
        .route("/download_report/:job_id", get(download))
        .route("/jobs", get(list))
}

/// Start a job over the session's records
///
/// POST /start_job
async fn start(
    State(state): State<FeatureState>,
    Extension(session): Extension<SessionId>,
) -> AppResult<Response> {
    let response = start_job::handle(&state, session).await?;
    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

/// Poll a job
///
/// GET /status/:job_id
async fn status(State(state): State<FeatureState>, Path(job_id): Path<String>) -> Response {
    let view = get_status::handle(&state, GetStatusQuery { job_id }).await;
    Json(view).into_response()
}

/// Download a finished job's report
///
/// GET /download_report/:job_id
async fn download(
    State(state): State<FeatureState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let report = download_report::handle(&state, DownloadReportQuery { job_id }).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", report.file_name))
        .map_err(|e| AppError::Internal(format!("Invalid report file name: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        report.content,
    )
        .into_response())
}

/// List jobs
///
/// GET /jobs
async fn list(State(state): State<FeatureState>) -> Response {
    let jobs = list_jobs::handle(&state).await;
    let total = jobs.len();
    ApiResponse::success_with_meta(jobs, json!({ "total": total })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_routes_exist() {
        let _router = jobs_routes();
    }
}
