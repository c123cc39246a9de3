//! Repository event records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A source-control activity delivered by webhook, stored by event-time.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RepoEvent {
    /// Webhook delivery identifier, unique per delivery
    pub id: String,

    /// Event type (`pull_request`, `push`, `issues`, ...)
    pub event_type: String,

    /// Repository full name (`owner/name`)
    pub repository: String,

    /// Event time extracted from the payload using the per-type rule
    pub event_time: DateTime<Utc>,

    /// Payload action, when present (`closed`, `opened`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Raw webhook payload
    pub payload: serde_json::Value,

    /// Whether the event has been consumed by correlation
    #[serde(default)]
    pub processed: bool,
}
