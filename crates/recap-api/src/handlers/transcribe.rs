//! Transcription handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use recap_models::{
    clip_key, is_valid_clip_id, transcript_key, Clip, ContentItemUpdate, Job, ProcessingStatus,
    TranscriptArtifact, TranscriptMeta,
};
use recap_pipeline::TranscribeOutcome;
use recap_queue::TranscribeBatchJob;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Body for `POST /api/transcribe/clip`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscribeClipRequest {
    pub clip_id: String,
}

/// `POST /api/transcribe/clip` - transcribe one clip synchronously.
pub async fn transcribe_clip(
    State(state): State<AppState>,
    Json(request): Json<TranscribeClipRequest>,
) -> ApiResult<Json<Value>> {
    if !is_valid_clip_id(&request.clip_id) {
        return Err(ApiError::validation("invalid clip id"));
    }

    match state.transcriber.transcribe_clip(&request.clip_id).await? {
        TranscribeOutcome::Complete(meta) => {
            record_outcome(&state, &request.clip_id, Ok(&meta)).await?;
            Ok(Json(json!({
                "success": true,
                "clip_id": request.clip_id,
                "transcript": meta,
            })))
        }
        TranscribeOutcome::Failed { code } => {
            record_outcome(&state, &request.clip_id, Err(code)).await?;
            Ok(Json(json!({
                "success": false,
                "clip_id": request.clip_id,
                "error": code,
            })))
        }
    }
}

/// Record a synchronous transcription outcome on the clip's content item,
/// when one exists. Success advances the lifecycle; failure records the
/// code and leaves the status alone.
async fn record_outcome(
    state: &AppState,
    clip_id: &str,
    outcome: Result<&TranscriptMeta, &str>,
) -> ApiResult<()> {
    let clip: Clip = match state.storage.get_json(&clip_key(clip_id)?).await {
        Ok(clip) => clip,
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if state.items.get(clip_id, clip.created_at).await?.is_none() {
        return Ok(());
    }

    let update = match outcome {
        Ok(meta) => ContentItemUpdate {
            processing_status: Some(ProcessingStatus::Transcribed),
            transcript_url: Some(meta.url.clone()),
            transcript_summary: Some(meta.summary.clone()),
            transcript_size_bytes: Some(meta.size_bytes),
            ..Default::default()
        },
        Err(code) => ContentItemUpdate {
            error: Some(code.to_string()),
            ..Default::default()
        },
    };
    state.items.update(clip_id, clip.created_at, update).await?;
    Ok(())
}

/// Body for `POST /api/transcribe/batch`.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TranscribeBatchRequest {
    #[validate(length(min = 1, max = 50))]
    pub clip_ids: Vec<String>,
}

/// `POST /api/transcribe/batch` - queue a transcription batch.
pub async fn transcribe_batch(
    State(state): State<AppState>,
    Json(request): Json<TranscribeBatchRequest>,
) -> ApiResult<Json<Value>> {
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    for clip_id in &request.clip_ids {
        if !is_valid_clip_id(clip_id) {
            return Err(ApiError::validation(format!("invalid clip id: {clip_id}")));
        }
    }

    let job = Job::new(json!({
        "kind": "transcribe_batch",
        "clip_ids": request.clip_ids,
    }));
    state.jobs.create(&job).await?;
    state
        .queue
        .enqueue_transcribe(TranscribeBatchJob::new(
            job.job_id.clone(),
            request.clip_ids,
        ))
        .await?;

    metrics::record_job_enqueued("transcribe_batch");
    Ok(Json(json!({
        "success": true,
        "job_id": job.job_id,
        "status": job.status,
    })))
}

/// `GET /api/transcribe/status/{clip_id}` - artifact presence for a clip.
pub async fn transcribe_status(
    State(state): State<AppState>,
    Path(clip_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !is_valid_clip_id(&clip_id) {
        return Err(ApiError::validation("invalid clip id"));
    }

    let json_exists = state
        .storage
        .exists(&transcript_key(&clip_id, TranscriptArtifact::Json)?)
        .await?;
    let ok_exists = state
        .storage
        .exists(&transcript_key(&clip_id, TranscriptArtifact::Ok)?)
        .await?;
    let vtt_exists = state
        .storage
        .exists(&transcript_key(&clip_id, TranscriptArtifact::Vtt)?)
        .await?;

    Ok(Json(json!({
        "success": true,
        "clip_id": clip_id,
        "transcribed": json_exists && ok_exists,
        "artifacts": {
            "json": json_exists,
            "ok": ok_exists,
            "vtt": vtt_exists,
        },
    })))
}
