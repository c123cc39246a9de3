//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::envelope::verify_envelope;
use crate::handlers::clips::{list_recent_clips, store_clips, stored_clips, update_clip};
use crate::handlers::content::generate_content;
use crate::handlers::dedup::{dedup_check, dedup_cleanup, dedup_file_info};
use crate::handlers::health::health;
use crate::handlers::jobs::{job_cleanup, job_stats, job_status, list_jobs};
use crate::handlers::transcribe::{transcribe_batch, transcribe_clip, transcribe_status};
use crate::handlers::validate::{
    validate_jobstore, validate_queue, validate_storage, validate_transcription, validate_twitch,
};
use crate::handlers::webhook::github_webhook;
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let clip_routes = Router::new()
        .route(
            "/twitch/clips",
            get(list_recent_clips).post(store_clips).put(update_clip),
        )
        .route("/twitch/clips/stored", get(stored_clips));

    let transcribe_routes = Router::new()
        .route("/transcribe/clip", post(transcribe_clip))
        .route("/transcribe/batch", post(transcribe_batch))
        .route("/transcribe/status/:clip_id", get(transcribe_status));

    let dedup_routes = Router::new()
        .route("/deduplication/check", post(dedup_check))
        .route("/deduplication/file-info/:clip_id", get(dedup_file_info))
        .route("/deduplication/cleanup", post(dedup_cleanup));

    let job_routes = Router::new()
        .route("/content/generate", post(generate_content))
        .route("/jobs", get(list_jobs))
        .route("/jobs/stats", get(job_stats))
        .route("/jobs/cleanup", post(job_cleanup))
        .route("/jobs/:job_id/status", get(job_status));

    let rate_limiter = std::sync::Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    // Every administrative route sits behind the HMAC envelope
    let api_routes = Router::new()
        .merge(clip_routes)
        .merge(transcribe_routes)
        .merge(dedup_routes)
        .merge(job_routes)
        .layer(middleware::from_fn_with_state(state.clone(), verify_envelope))
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    // Validation probes are signed like the rest of the admin surface
    let validate_routes = Router::new()
        .route("/validate-storage", get(validate_storage))
        .route("/validate-jobstore", get(validate_jobstore))
        .route("/validate-queue", get(validate_queue))
        .route("/validate-twitch", get(validate_twitch))
        .route("/validate-transcription", get(validate_transcription))
        .layer(middleware::from_fn_with_state(state.clone(), verify_envelope));

    // Webhooks carry the producer's signature instead of the envelope
    let webhook_routes = Router::new().route("/webhook/github", post(github_webhook));

    let health_routes = Router::new().route("/health", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(validate_routes)
        .merge(webhook_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
