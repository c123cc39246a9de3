//! Axum administrative API server.
//!
//! Every `/api` route sits behind the HMAC request envelope; `/health` and
//! `/metrics` are the only unsigned surfaces. Responses follow the
//! `{success, ...}` envelope throughout.

pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
