//! Drafting model client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AiError, AiResult};

/// Drafting client configuration.
#[derive(Debug, Clone)]
pub struct DraftingConfig {
    /// Base URL of the drafting service
    pub base_url: String,
    /// Bearer token for the service
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
}

impl DraftingConfig {
    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Ok(Self {
            base_url: std::env::var("DRAFTING_BASE_URL")
                .map_err(|_| AiError::config_error("DRAFTING_BASE_URL not set"))?,
            api_key: std::env::var("DRAFTING_API_KEY")
                .map_err(|_| AiError::config_error("DRAFTING_API_KEY not set"))?,
            timeout: Duration::from_secs(
                std::env::var("DRAFTING_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// Sampling parameters for one drafting call.
///
/// Defaults are tuned for near-deterministic drafts; the prompt hash covers
/// every field here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftParams {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub seed: u64,
    pub max_tokens: u32,
}

impl Default for DraftParams {
    fn default() -> Self {
        Self {
            model: "recap-drafter-large".to_string(),
            temperature: 0.3,
            top_p: 0.9,
            seed: 42,
            max_tokens: 2000,
        }
    }
}

impl DraftParams {
    /// Create params from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: std::env::var("DRAFTING_MODEL").unwrap_or(defaults.model),
            temperature: std::env::var("DRAFTING_TEMPERATURE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.temperature),
            top_p: std::env::var("DRAFTING_TOP_P")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.top_p),
            seed: std::env::var("DRAFTING_SEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.seed),
            max_tokens: std::env::var("DRAFTING_MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_tokens),
        }
    }
}

/// Request body sent to the drafting service.
#[derive(Debug, Serialize)]
struct DraftRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    temperature: f64,
    top_p: f64,
    seed: u64,
    max_tokens: u32,
}

/// Response from the drafting service.
#[derive(Debug, Deserialize)]
struct DraftResponse {
    text: String,
}

/// Drafting model client.
#[derive(Clone)]
pub struct DraftingClient {
    config: DraftingConfig,
    client: Client,
}

impl DraftingClient {
    /// Create a new client.
    pub fn new(config: DraftingConfig) -> AiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(DraftingConfig::from_env()?)
    }

    /// Generate raw model output for a prompt.
    pub async fn generate(&self, prompt: &str, params: &DraftParams) -> AiResult<String> {
        let url = format!("{}/v1/generate", self.config.base_url.trim_end_matches('/'));
        debug!(model = %params.model, prompt_chars = prompt.len(), "Requesting draft");

        let request = DraftRequest {
            prompt,
            model: &params.model,
            temperature: params.temperature,
            top_p: params.top_p,
            seed: params.seed,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::drafting_failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AiError::drafting_failed(format!("service returned {status}")));
        }

        let parsed: DraftResponse = response
            .json()
            .await
            .map_err(|e| AiError::MalformedOutput(format!("bad draft body: {e}")))?;

        info!(chars = parsed.text.len(), "Received draft");
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generate_sends_sampling_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .and(body_partial_json(serde_json::json!({
                "temperature": 0.3,
                "top_p": 0.9,
                "seed": 42,
                "max_tokens": 2000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "{\"intro\": \"Welcome\"}"
            })))
            .mount(&server)
            .await;

        let client = DraftingClient::new(DraftingConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let text = client
            .generate("draft the recap", &DraftParams::default())
            .await
            .unwrap();
        assert!(text.contains("Welcome"));
    }

    #[tokio::test]
    async fn test_upstream_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/generate"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = DraftingClient::new(DraftingConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let err = client
            .generate("draft", &DraftParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::DraftingFailed(_)));
    }
}
