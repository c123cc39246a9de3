//! Job status and administration handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use recap_firestore::{ListJobsQuery, SortOrder};
use recap_models::{Job, JobId, JobStatus};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Stats window.
const STATS_WINDOW_HOURS: i64 = 24;

/// What observers see about a job. Failures carry only
/// `{code, message, occurred_at}`.
fn job_view(job: &Job) -> Value {
    json!({
        "job_id": job.job_id,
        "status": job.status,
        "created_at": job.created_at,
        "updated_at": job.updated_at,
        "expires_at": job.expires_at,
        "started_at": job.started_at,
        "completed_at": job.completed_at,
        "progress": job.progress,
        "results": job.results,
        "error": job.failure(),
    })
}

/// `GET /api/jobs/{id}/status`
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let job = state
        .jobs
        .get(&JobId::from_string(&job_id))
        .await?
        .ok_or_else(|| ApiError::not_found(job_id))?;

    Ok(Json(json!({ "success": true, "job": job_view(&job) })))
}

/// Query for `GET /api/jobs`.
#[derive(Debug, Deserialize, Default)]
pub struct ListJobsParams {
    pub status: Option<String>,
    pub cursor: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u32>,
}

/// `GET /api/jobs` - cursor-paged listing.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsParams>,
) -> ApiResult<Json<Value>> {
    let status = match params.status.as_deref() {
        Some(s) => Some(
            JobStatus::parse(s).ok_or_else(|| ApiError::validation(format!("unknown status: {s}")))?,
        ),
        None => None,
    };
    if let Some(limit) = params.limit {
        if !(1..=100).contains(&limit) {
            return Err(ApiError::validation("limit must be 1..100"));
        }
    }

    let page = state
        .jobs
        .list(ListJobsQuery {
            status,
            limit: params.limit,
            cursor: params.cursor,
            order: params
                .order
                .as_deref()
                .map(SortOrder::from_str_or_default)
                .unwrap_or_default(),
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "jobs": page.jobs.iter().map(job_view).collect::<Vec<_>>(),
        "has_more": page.has_more,
        "cursor": page.next_cursor,
    })))
}

/// `GET /api/jobs/stats`
pub async fn job_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let stats = state.jobs.stats(STATS_WINDOW_HOURS).await?;
    Ok(Json(json!({ "success": true, "stats": stats })))
}

/// `POST /api/jobs/cleanup` - sweep expired job records.
pub async fn job_cleanup(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let deleted = state.jobs.cleanup_expired().await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
