//! Clip ingestion and listing handlers.

use std::collections::{HashMap, HashSet};

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use recap_models::{clip_key, is_valid_clip_id, Clip, ClipUpdate, ContentItem};
use recap_storage::DEFAULT_HEAD_PARALLELISM;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Batch limits on clip ingestion.
const MAX_BATCH_CLIPS: usize = 100;

/// Listing cap on stored clips.
const MAX_STORED_PAGE: i32 = 100;

/// How far back the platform listing reaches.
const RECENT_CLIPS_HOURS: i64 = 24;

/// `GET /api/twitch/clips` - list recent clips from the platform.
pub async fn list_recent_clips(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let since = Utc::now() - Duration::hours(RECENT_CLIPS_HOURS);
    let clips = state.twitch.recent_clips(since).await?;
    Ok(Json(json!({
        "success": true,
        "count": clips.len(),
        "clips": clips,
    })))
}

/// Body for `POST /api/twitch/clips`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreClipsRequest {
    pub clips: Vec<Clip>,
}

/// `POST /api/twitch/clips` - store a validated batch.
///
/// Each clip is validated, duplicate ids inside the batch are rejected,
/// and a pending content item is created for clips seen for the first
/// time.
pub async fn store_clips(
    State(state): State<AppState>,
    Json(request): Json<StoreClipsRequest>,
) -> ApiResult<Json<Value>> {
    if request.clips.is_empty() {
        return Err(ApiError::validation("clips must not be empty"));
    }
    if request.clips.len() > MAX_BATCH_CLIPS {
        return Err(ApiError::validation(format!(
            "batch exceeds {MAX_BATCH_CLIPS} clips"
        )));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for clip in &request.clips {
        clip.validate()?;
        if !seen.insert(clip.clip_id.as_str()) {
            return Err(ApiError::validation(format!(
                "duplicate clip id in batch: {}",
                clip.clip_id
            )));
        }
    }

    let mut stored = 0u64;
    let mut already_known = 0u64;
    for clip in &request.clips {
        let key = clip_key(&clip.clip_id)?;
        let exists = state.storage.exists(&key).await?;

        state
            .storage
            .put(
                &key,
                serde_json::to_vec(clip).map_err(|e| ApiError::internal(e.to_string()))?,
                "application/json",
                HashMap::from([("clip-id".to_string(), clip.clip_id.clone())]),
            )
            .await?;

        if exists {
            already_known += 1;
        } else {
            // First sighting: open the lifecycle record
            state.items.store(ContentItem::from_clip(clip)).await?;
            stored += 1;
        }
    }

    metrics::record_clips_stored(stored);
    info!(stored, already_known, "Stored clip batch");
    Ok(Json(json!({
        "success": true,
        "stored": stored,
        "already_known": already_known,
    })))
}

/// Body for `PUT /api/twitch/clips`. Only the whitelisted fields exist
/// here; anything else is rejected outright.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateClipRequest {
    pub clip_id: String,
    pub title: Option<String>,
    pub view_count: Option<u64>,
    pub thumbnail_url: Option<String>,
}

impl UpdateClipRequest {
    fn into_update(self) -> (String, ClipUpdate) {
        (
            self.clip_id,
            ClipUpdate {
                title: self.title,
                view_count: self.view_count,
                thumbnail_url: self.thumbnail_url,
            },
        )
    }
}

/// `PUT /api/twitch/clips` - update one stored clip, whitelisted fields
/// only.
pub async fn update_clip(
    State(state): State<AppState>,
    Json(request): Json<UpdateClipRequest>,
) -> ApiResult<Json<Value>> {
    let (clip_id, update) = request.into_update();
    if !is_valid_clip_id(&clip_id) {
        return Err(ApiError::validation("invalid clip id"));
    }
    if update.is_empty() {
        return Err(ApiError::validation("no updatable fields supplied"));
    }

    let key = clip_key(&clip_id)?;
    let clip: Clip = match state.storage.get_json(&key).await {
        Ok(clip) => clip,
        Err(e) if e.is_not_found() => return Err(ApiError::not_found(clip_id)),
        Err(e) => return Err(e.into()),
    };

    let merged = update.apply(clip);
    merged.validate()?;
    state
        .storage
        .put(
            &key,
            serde_json::to_vec(&merged).map_err(|e| ApiError::internal(e.to_string()))?,
            "application/json",
            HashMap::from([("clip-id".to_string(), merged.clip_id.clone())]),
        )
        .await?;

    Ok(Json(json!({ "success": true, "clip": merged })))
}

/// Query for `GET /api/twitch/clips/stored`.
#[derive(Debug, Deserialize, Default)]
pub struct StoredClipsQuery {
    pub id: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i32>,
}

/// `GET /api/twitch/clips/stored[?id=]` - fetch one clip or a page.
pub async fn stored_clips(
    State(state): State<AppState>,
    Query(query): Query<StoredClipsQuery>,
) -> ApiResult<Json<Value>> {
    if let Some(id) = &query.id {
        if !is_valid_clip_id(id) {
            return Err(ApiError::validation("invalid clip id"));
        }
        let key = clip_key(id)?;
        return match state.storage.get_json::<Clip>(&key).await {
            Ok(clip) => Ok(Json(json!({ "success": true, "clip": clip }))),
            Err(e) if e.is_not_found() => Err(ApiError::not_found(id.clone())),
            Err(e) => Err(e.into()),
        };
    }

    let limit = query.limit.unwrap_or(MAX_STORED_PAGE).clamp(1, MAX_STORED_PAGE);
    let page = state
        .storage
        .list("clips/", query.cursor.as_deref(), Some(limit))
        .await?;

    // Batch-fetch bodies with bounded parallelism
    let clips: Vec<Clip> = stream::iter(page.objects.iter())
        .map(|obj| state.storage.get_json::<Clip>(&obj.key))
        .buffered(DEFAULT_HEAD_PARALLELISM)
        .filter_map(|result| async move { result.ok() })
        .collect()
        .await;

    Ok(Json(json!({
        "success": true,
        "count": clips.len(),
        "clips": clips,
        "has_more": page.truncated,
        "cursor": page.cursor,
    })))
}
