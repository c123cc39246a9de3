//! Connectivity probes for the external collaborators.

use std::time::Instant;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

fn probe_result(target: &str, start: Instant, outcome: Result<(), String>) -> Json<Value> {
    match outcome {
        Ok(()) => Json(json!({
            "success": true,
            "target": target,
            "latency_ms": start.elapsed().as_millis() as u64,
        })),
        Err(error) => Json(json!({
            "success": false,
            "target": target,
            "error": error,
        })),
    }
}

/// `GET /validate-storage`
pub async fn validate_storage(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let start = Instant::now();
    let outcome = state
        .storage
        .check_connectivity()
        .await
        .map_err(|e| e.to_string());
    Ok(probe_result("storage", start, outcome))
}

/// `GET /validate-jobstore`
pub async fn validate_jobstore(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let start = Instant::now();
    let outcome = state.jobs.stats(1).await.map(|_| ()).map_err(|e| e.to_string());
    Ok(probe_result("jobstore", start, outcome))
}

/// `GET /validate-queue`
pub async fn validate_queue(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let start = Instant::now();
    let outcome = state.queue.len().await.map(|_| ()).map_err(|e| e.to_string());
    Ok(probe_result("queue", start, outcome))
}

/// `GET /validate-twitch`
pub async fn validate_twitch(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let start = Instant::now();
    let outcome = state
        .twitch
        .check_connectivity()
        .await
        .map_err(|e| e.to_string());
    Ok(probe_result("twitch", start, outcome))
}

/// `GET /validate-transcription`
pub async fn validate_transcription(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let start = Instant::now();
    let outcome = state
        .transcription_client
        .check_connectivity()
        .await
        .map_err(|e| e.to_string());
    Ok(probe_result("transcription", start, outcome))
}
