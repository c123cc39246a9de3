//! Transcription model client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AiError, AiResult};

/// Transcription client configuration.
#[derive(Debug, Clone)]
pub struct TranscriptionConfig {
    /// Base URL of the transcription service
    pub base_url: String,
    /// Bearer token for the service
    pub api_key: String,
    /// Model identifier recorded on transcripts
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl TranscriptionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Ok(Self {
            base_url: std::env::var("TRANSCRIPTION_BASE_URL")
                .map_err(|_| AiError::config_error("TRANSCRIPTION_BASE_URL not set"))?,
            api_key: std::env::var("TRANSCRIPTION_API_KEY")
                .map_err(|_| AiError::config_error("TRANSCRIPTION_API_KEY not set"))?,
            model: std::env::var("TRANSCRIPTION_MODEL")
                .unwrap_or_else(|_| "whisper-1".to_string()),
            timeout: Duration::from_secs(
                std::env::var("TRANSCRIPTION_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        })
    }
}

/// Request body sent to the transcription service.
#[derive(Debug, Serialize)]
struct TranscriptionRequest<'a> {
    audio: &'a str,
    model: &'a str,
}

/// One timed segment from the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Response from the transcription service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscriptionResponse {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub segments: Vec<TranscriptionSegment>,
}

fn default_language() -> String {
    "en".to_string()
}

/// Transcription model client.
#[derive(Clone)]
pub struct TranscriptionClient {
    config: TranscriptionConfig,
    client: Client,
}

impl TranscriptionClient {
    /// Create a new client.
    pub fn new(config: TranscriptionConfig) -> AiResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AiError::Network)?;
        Ok(Self { config, client })
    }

    /// Create from environment variables.
    pub fn from_env() -> AiResult<Self> {
        Self::new(TranscriptionConfig::from_env()?)
    }

    /// Model identifier recorded on transcripts.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Transcribe base64-encoded WAV audio.
    ///
    /// Any non-success response is a failure; there is no in-process retry.
    pub async fn transcribe(&self, audio_base64: &str) -> AiResult<TranscriptionResponse> {
        let url = format!("{}/v1/transcribe", self.config.base_url.trim_end_matches('/'));
        debug!("Sending {} base64 chars for transcription", audio_base64.len());

        let request = TranscriptionRequest {
            audio: audio_base64,
            model: &self.config.model,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::transcription_failed(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AiError::transcription_failed(format!(
                "service returned {status}"
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AiError::MalformedOutput(format!("bad transcription body: {e}")))?;

        info!(
            language = %parsed.language,
            segments = parsed.segments.len(),
            "Received transcription"
        );
        Ok(parsed)
    }

    /// Cheap connectivity probe for the validation endpoint.
    pub async fn check_connectivity(&self) -> AiResult<()> {
        let url = format!("{}/v1/health", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(AiError::transcription_failed(format!(
                "health probe returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> TranscriptionConfig {
        TranscriptionConfig {
            base_url: server.uri(),
            api_key: "test-key".to_string(),
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_transcribe_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcribe"))
            .and(body_partial_json(serde_json::json!({"model": "whisper-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "hello world",
                "language": "en",
                "segments": [{"start": 0.0, "end": 1.0, "text": "hello world"}]
            })))
            .mount(&server)
            .await;

        let client = TranscriptionClient::new(config_for(&server)).unwrap();
        let response = client.transcribe("QUJD").await.unwrap();
        assert_eq!(response.text, "hello world");
        assert_eq!(response.segments.len(), 1);
    }

    #[tokio::test]
    async fn test_non_success_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcribe"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = TranscriptionClient::new(config_for(&server)).unwrap();
        let err = client.transcribe("QUJD").await.unwrap_err();
        assert!(matches!(err, AiError::TranscriptionFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_segments_defaults_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/transcribe"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "no alignment here"
            })))
            .mount(&server)
            .await;

        let client = TranscriptionClient::new(config_for(&server)).unwrap();
        let response = client.transcribe("QUJD").await.unwrap();
        assert!(response.segments.is_empty());
        assert_eq!(response.language, "en");
    }
}
