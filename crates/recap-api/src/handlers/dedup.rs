//! Deduplication handlers over the audio/transcript keyspace.

use std::collections::{HashMap, HashSet};

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use recap_models::{audio_key, is_valid_clip_id, transcript_key, TranscriptArtifact};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body for `POST /api/deduplication/check`.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DedupCheckRequest {
    #[validate(length(min = 1, max = 100))]
    pub clip_ids: Vec<String>,
}

/// `POST /api/deduplication/check` - which clips already have artifacts.
pub async fn dedup_check(
    State(state): State<AppState>,
    Json(request): Json<DedupCheckRequest>,
) -> ApiResult<Json<Value>> {
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let mut results = Vec::with_capacity(request.clip_ids.len());
    for clip_id in &request.clip_ids {
        if !is_valid_clip_id(clip_id) {
            return Err(ApiError::validation(format!("invalid clip id: {clip_id}")));
        }
        let audio = state.storage.exists(&audio_key(clip_id)?).await?;
        let transcript = state
            .storage
            .exists(&transcript_key(clip_id, TranscriptArtifact::Json)?)
            .await?;
        results.push(json!({
            "clip_id": clip_id,
            "audio": audio,
            "transcript": transcript,
        }));
    }

    Ok(Json(json!({ "success": true, "results": results })))
}

/// `GET /api/deduplication/file-info/{clip_id}` - artifact heads.
pub async fn dedup_file_info(
    State(state): State<AppState>,
    Path(clip_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !is_valid_clip_id(&clip_id) {
        return Err(ApiError::validation("invalid clip id"));
    }

    let mut files = serde_json::Map::new();
    for (name, key) in [
        ("audio", audio_key(&clip_id)?),
        ("transcript", transcript_key(&clip_id, TranscriptArtifact::Json)?),
        ("text", transcript_key(&clip_id, TranscriptArtifact::Text)?),
        ("subtitles", transcript_key(&clip_id, TranscriptArtifact::Vtt)?),
    ] {
        match state.storage.head(&key).await {
            Ok(head) => {
                files.insert(
                    name.to_string(),
                    json!({
                        "key": head.key,
                        "size": head.size,
                        "content_type": head.content_type,
                    }),
                );
            }
            Err(e) if e.is_not_found() => {
                files.insert(name.to_string(), Value::Null);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(Json(json!({
        "success": true,
        "clip_id": clip_id,
        "files": files,
    })))
}

/// `POST /api/deduplication/cleanup` - delete transcript artifacts whose
/// `.ok` marker is missing (interrupted writes).
pub async fn dedup_cleanup(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let objects = state.storage.list_all("transcripts/").await?;

    // Group sibling artifacts by clip id
    let mut by_clip: HashMap<String, Vec<String>> = HashMap::new();
    let mut marked: HashSet<String> = HashSet::new();
    for obj in objects {
        let Some(file) = obj.key.strip_prefix("transcripts/") else {
            continue;
        };
        let Some((clip_id, extension)) = file.rsplit_once('.') else {
            continue;
        };
        if extension == "ok" {
            marked.insert(clip_id.to_string());
        } else {
            by_clip
                .entry(clip_id.to_string())
                .or_default()
                .push(obj.key.clone());
        }
    }

    let orphaned: Vec<String> = by_clip
        .into_iter()
        .filter(|(clip_id, _)| !marked.contains(clip_id))
        .flat_map(|(_, keys)| keys)
        .collect();

    let deleted = state.storage.delete_batch(&orphaned).await?;
    info!(deleted, "Cleaned up unmarked transcript artifacts");

    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
