//! Content generation handlers.

use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use recap_firestore::UpdateStatus;
use recap_models::{Job, JobStatus, PostKind};
use recap_queue::GenerateContentJob;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Body for `POST /api/content/generate`.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GenerateContentRequest {
    /// Day to recap, `YYYY-MM-DD` in the blog timezone; defaults to today
    pub date: Option<String>,
    /// IANA timezone override
    pub tz: Option<String>,
    #[serde(default)]
    pub post_kind: Option<PostKind>,
    /// Run inline instead of queueing
    #[serde(default)]
    pub sync: bool,
}

/// `POST /api/content/generate` - start (or run) the daily recap.
pub async fn generate_content(
    State(state): State<AppState>,
    Json(request): Json<GenerateContentRequest>,
) -> ApiResult<Json<Value>> {
    let tz = match &request.tz {
        Some(tz) => state.pipeline.parse_timezone(tz)?,
        None => state.pipeline.default_timezone()?,
    };
    let date = match &request.date {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::validation(format!("not a date: {raw}")))?,
        None => chrono::Utc::now().with_timezone(&tz).date_naive(),
    };
    let post_kind = request.post_kind.unwrap_or_default();

    let job = Job::new(json!({
        "kind": "generate_content",
        "date": date.format("%Y-%m-%d").to_string(),
        "tz": tz.name(),
        "post_kind": post_kind,
    }));
    state.jobs.create(&job).await?;

    if request.sync {
        return run_sync(state, job, date, tz, post_kind).await;
    }

    let queue_job = GenerateContentJob {
        job_id: job.job_id.clone(),
        date: date.format("%Y-%m-%d").to_string(),
        tz: tz.name().to_string(),
        post_kind,
        created_at: chrono::Utc::now(),
    };
    state.queue.enqueue_generate(queue_job).await?;

    metrics::record_job_enqueued("generate_content");
    Ok(Json(json!({
        "success": true,
        "job_id": job.job_id,
        "status": job.status,
    })))
}

/// Inline execution for the sync path. The job record still tracks the
/// run so observers see the same lifecycle either way.
async fn run_sync(
    state: AppState,
    job: Job,
    date: NaiveDate,
    tz: chrono_tz::Tz,
    post_kind: PostKind,
) -> ApiResult<Json<Value>> {
    state
        .jobs
        .update_status(
            &job.job_id,
            UpdateStatus {
                status: Some(JobStatus::Processing),
                worker_id: Some("api-sync".to_string()),
                ..Default::default()
            },
        )
        .await?;

    let outcome = async {
        let items = state.pipeline.fetch_content_items(date, tz).await?;
        let mut manifest = state
            .pipeline
            .build_manifest(date, tz, post_kind, items)
            .await?;
        state.pipeline.judge_and_draft(&mut manifest).await?;
        state.pipeline.prepare_response(&manifest).await
    }
    .await;

    match outcome {
        Ok(result) => {
            let results = result.to_results_json();
            state
                .jobs
                .update_status(
                    &job.job_id,
                    UpdateStatus {
                        status: Some(JobStatus::Completed),
                        results: Some(results.clone()),
                        ..Default::default()
                    },
                )
                .await?;
            info!(job_id = %job.job_id, "Synchronous generation completed");
            Ok(Json(json!({
                "success": true,
                "job_id": job.job_id,
                "results": results,
            })))
        }
        Err(e) => {
            error!(job_id = %job.job_id, "Synchronous generation failed: {}", e);
            state.errors.track_error(
                e.code(),
                e.to_string(),
                json!({ "job_id": job.job_id, "date": date.to_string() }),
            );
            state
                .jobs
                .update_status(
                    &job.job_id,
                    UpdateStatus {
                        status: Some(JobStatus::Failed),
                        error_message: Some(e.to_string()),
                        error_code: Some(e.code().to_string()),
                        ..Default::default()
                    },
                )
                .await?;
            Err(e.into())
        }
    }
}
