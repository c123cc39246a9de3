//! Twitch Helix client for clip ingestion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use recap_models::Clip;

use crate::error::{ApiError, ApiResult};

/// Refresh app tokens this long before they actually expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Twitch client configuration.
#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Broadcaster whose clips are ingested
    pub broadcaster_id: String,
    pub timeout: Duration,
}

impl TwitchConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ApiResult<Self> {
        Ok(Self {
            client_id: std::env::var("TWITCH_CLIENT_ID")
                .map_err(|_| ApiError::internal("TWITCH_CLIENT_ID not set"))?,
            client_secret: std::env::var("TWITCH_CLIENT_SECRET")
                .map_err(|_| ApiError::internal("TWITCH_CLIENT_SECRET not set"))?,
            broadcaster_id: std::env::var("TWITCH_BROADCASTER_ID")
                .map_err(|_| ApiError::internal("TWITCH_BROADCASTER_ID not set"))?,
            timeout: Duration::from_secs(30),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct ClipsResponse {
    data: Vec<HelixClip>,
}

/// A clip as Helix returns it.
#[derive(Debug, Deserialize)]
struct HelixClip {
    id: String,
    title: String,
    url: String,
    embed_url: String,
    thumbnail_url: String,
    duration: f64,
    view_count: u64,
    created_at: DateTime<Utc>,
    broadcaster_name: String,
    creator_name: String,
}

impl From<HelixClip> for Clip {
    fn from(raw: HelixClip) -> Self {
        Clip {
            clip_id: raw.id,
            title: raw.title,
            url: raw.url,
            embed_url: raw.embed_url,
            thumbnail_url: raw.thumbnail_url,
            duration_seconds: raw.duration,
            view_count: raw.view_count,
            created_at: raw.created_at,
            broadcaster: raw.broadcaster_name,
            creator: raw.creator_name,
        }
    }
}

/// Twitch Helix API client with a cached app access token.
#[derive(Clone)]
pub struct TwitchClient {
    config: TwitchConfig,
    client: Client,
    token: Arc<RwLock<Option<(String, Instant)>>>,
}

impl TwitchClient {
    pub fn new(config: TwitchConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(Self {
            config,
            client,
            token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn from_env() -> ApiResult<Self> {
        Self::new(TwitchConfig::from_env()?)
    }

    /// Fetch or reuse the app access token.
    async fn get_token(&self) -> ApiResult<String> {
        {
            let cached = self.token.read().await;
            if let Some((token, expires_at)) = cached.as_ref() {
                if Instant::now() + TOKEN_REFRESH_MARGIN < *expires_at {
                    return Ok(token.clone());
                }
            }
        }

        debug!("Refreshing Twitch app access token");
        let response = self
            .client
            .post("https://id.twitch.tv/oauth2/token")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Twitch token request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::internal(format!(
                "Twitch token request returned {}",
                response.status()
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::internal(format!("bad token body: {e}")))?;

        let expires_at = Instant::now() + Duration::from_secs(parsed.expires_in);
        *self.token.write().await = Some((parsed.access_token.clone(), expires_at));
        Ok(parsed.access_token)
    }

    /// List clips created since `started_at` for the configured
    /// broadcaster.
    pub async fn recent_clips(&self, started_at: DateTime<Utc>) -> ApiResult<Vec<Clip>> {
        let token = self.get_token().await?;

        let response = self
            .client
            .get("https://api.twitch.tv/helix/clips")
            .bearer_auth(&token)
            .header("Client-Id", &self.config.client_id)
            .query(&[
                ("broadcaster_id", self.config.broadcaster_id.as_str()),
                ("started_at", &started_at.to_rfc3339()),
                ("first", "100"),
            ])
            .send()
            .await
            .map_err(|e| ApiError::internal(format!("Twitch clips request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ApiError::internal(format!(
                "Twitch clips request returned {}",
                response.status()
            )));
        }

        let parsed: ClipsResponse = response
            .json()
            .await
            .map_err(|e| ApiError::internal(format!("bad clips body: {e}")))?;

        let clips: Vec<Clip> = parsed.data.into_iter().map(Clip::from).collect();
        info!(count = clips.len(), "Fetched recent clips from platform");
        Ok(clips)
    }

    /// Credential probe for the validation endpoint and the hourly check.
    pub async fn check_connectivity(&self) -> ApiResult<()> {
        self.get_token().await.map(|_| ())
    }
}
