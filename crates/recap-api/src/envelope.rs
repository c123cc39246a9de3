//! The HMAC request envelope for administrative routes.
//!
//! Every administrative request carries four headers:
//! `X-Request-Signature`, `X-Request-Timestamp`, `X-Request-Nonce`, and
//! `X-Idempotency-Key`. The signature is HMAC-SHA256 over
//! `body || timestamp || nonce` under the shared admin secret. Bearer
//! tokens are explicitly rejected on these routes, and every failure mode
//! collapses into the same generic 401.

use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew for the request timestamp, seconds.
const TIMESTAMP_WINDOW_SECS: i64 = 5 * 60;

/// TTL for honored idempotency keys.
const IDEMPOTENCY_TTL_SECS: u64 = 3600;

pub const SIGNATURE_HEADER: &str = "x-request-signature";
pub const TIMESTAMP_HEADER: &str = "x-request-timestamp";
pub const NONCE_HEADER: &str = "x-request-nonce";
pub const IDEMPOTENCY_HEADER: &str = "x-idempotency-key";

/// Verify the envelope on an administrative request.
///
/// The body is buffered for signing and re-attached for the handler, so
/// this middleware must sit inside the body-size limit layer.
pub async fn verify_envelope(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match check_envelope(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

async fn check_envelope(
    state: &AppState,
    request: Request<Body>,
) -> Result<Request<Body>, ApiError> {
    // Bearer auth has no place on the administrative surface, with or
    // without the HMAC headers
    if request.headers().contains_key("authorization") {
        warn!("Rejected administrative request carrying Authorization");
        return Err(ApiError::Unauthorized);
    }

    let header = |name: &str| -> Result<String, ApiError> {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or(ApiError::Unauthorized)
    };

    let signature = header(SIGNATURE_HEADER)?;
    let timestamp = header(TIMESTAMP_HEADER)?;
    let nonce = header(NONCE_HEADER)?;
    let idempotency_key = header(IDEMPOTENCY_HEADER)?;

    // Timestamps outside the window are replays or clock drift; same 401
    let ts: i64 = timestamp.parse().map_err(|_| ApiError::Unauthorized)?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > TIMESTAMP_WINDOW_SECS {
        warn!("Rejected administrative request with stale timestamp");
        return Err(ApiError::Unauthorized);
    }

    let signature_bytes = hex::decode(&signature).map_err(|_| ApiError::Unauthorized)?;

    // Buffer the body for signing, then rebuild the request
    let (parts, body) = request.into_parts();
    let is_mutation = !matches!(parts.method.as_str(), "GET" | "HEAD" | "OPTIONS");
    let body_bytes = to_bytes(body, state.config.max_body_size)
        .await
        .map_err(|_| ApiError::Unauthorized)?;

    let mut mac = HmacSha256::new_from_slice(state.config.admin_secret.as_bytes())
        .map_err(|_| ApiError::Unauthorized)?;
    mac.update(&body_bytes);
    mac.update(timestamp.as_bytes());
    mac.update(nonce.as_bytes());
    if mac.verify_slice(&signature_bytes).is_err() {
        warn!("Rejected administrative request with bad signature");
        return Err(ApiError::Unauthorized);
    }

    // Honor idempotency keys for state-changing requests
    if is_mutation {
        let acquired = state
            .queue
            .try_acquire_idempotency(&idempotency_key, IDEMPOTENCY_TTL_SECS)
            .await
            .map_err(|_| ApiError::internal("idempotency store unavailable"))?;
        if !acquired {
            return Err(ApiError::conflict("duplicate request"));
        }
    }

    Ok(Request::from_parts(parts, Body::from(body_bytes)))
}

/// Verify a GitHub webhook delivery (`X-Hub-Signature-256`).
pub fn verify_webhook_signature(secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Some(hex_part) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(signature) = hex::decode(hex_part) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Sign a payload the way callers must; used by the probes and tests.
pub fn sign_request(secret: &str, body: &[u8], timestamp: &str, nonce: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(body);
    mac.update(timestamp.as_bytes());
    mac.update(nonce.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let secret = "shared-secret";
        let body = b"{\"clip_ids\":[\"ClipA_01\"]}";
        let signature = sign_request(secret, body, "1715350000", "nonce-1");

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        mac.update(b"1715350000");
        mac.update(b"nonce-1");
        assert!(mac.verify_slice(&hex::decode(signature).unwrap()).is_ok());
    }

    #[test]
    fn test_signature_covers_all_parts() {
        let secret = "shared-secret";
        let base = sign_request(secret, b"body", "100", "n");
        assert_ne!(base, sign_request(secret, b"body2", "100", "n"));
        assert_ne!(base, sign_request(secret, b"body", "101", "n"));
        assert_ne!(base, sign_request(secret, b"body", "100", "m"));
        assert_ne!(base, sign_request("other", b"body", "100", "n"));
    }

    #[test]
    fn test_webhook_signature() {
        let secret = "hook-secret";
        let body = b"{\"action\":\"closed\"}";

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let good = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));

        assert!(verify_webhook_signature(secret, body, &good));
        assert!(!verify_webhook_signature(secret, b"tampered", &good));
        assert!(!verify_webhook_signature(secret, body, "sha256=deadbeef"));
        assert!(!verify_webhook_signature(secret, body, "plain-hex"));
    }
}
