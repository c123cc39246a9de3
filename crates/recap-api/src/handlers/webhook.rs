//! GitHub webhook intake.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::envelope::verify_webhook_signature;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// `POST /webhook/github` - verify and store a delivery.
///
/// Webhooks carry GitHub's own signature scheme, not the admin envelope;
/// the raw body is verified before any parsing happens.
pub async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if !verify_webhook_signature(&state.config.webhook_secret, &body, signature) {
        warn!("Rejected webhook delivery with bad signature");
        return Err(ApiError::Unauthorized);
    }

    let event_type = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::validation("missing X-GitHub-Event"))?
        .to_string();
    let delivery_id = headers
        .get("x-github-delivery")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::validation("missing X-GitHub-Delivery"))?
        .to_string();

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::validation("payload is not JSON"))?;

    let event = state
        .correlator
        .store_event(&delivery_id, &event_type, payload)
        .await?;

    metrics::record_event_stored(&event_type);
    info!(delivery_id = %event.id, event_type = %event.event_type, "Stored webhook delivery");
    Ok(Json(json!({
        "success": true,
        "delivery_id": event.id,
        "event_type": event.event_type,
        "event_time": event.event_time,
    })))
}
