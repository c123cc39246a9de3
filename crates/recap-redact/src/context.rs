//! Key-name based sanitization of structured log/error contexts.

use serde_json::Value;

/// Masked replacement for sensitive values.
const MASK: &str = "[redacted]";

/// Key names whose values must never reach a log line.
const SENSITIVE_KEY_PARTS: [&str; 7] = [
    "token",
    "secret",
    "authorization",
    "api-key",
    "api_key",
    "cookie",
    "password",
];

/// Whether a map key or header name is sensitive by name.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}

/// Deep-sanitize a JSON tree by key-name pattern.
///
/// Values under sensitive keys are replaced wholesale; arrays and nested
/// objects are walked. Non-sensitive leaves are untouched.
pub fn sanitize_context(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, inner) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(MASK.to_string()));
                } else {
                    out.insert(key.clone(), sanitize_context(inner));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_context).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sensitive_keys() {
        assert!(is_sensitive_key("Authorization"));
        assert!(is_sensitive_key("X-Api-Key"));
        assert!(is_sensitive_key("access_token"));
        assert!(is_sensitive_key("Cookie"));
        assert!(!is_sensitive_key("clip_id"));
        assert!(!is_sensitive_key("repository"));
    }

    #[test]
    fn test_deep_masking() {
        let input = json!({
            "clip_id": "ClipA_01",
            "headers": {
                "Authorization": "Bearer abc",
                "X-Request-ID": "r1"
            },
            "attempts": [{"api_key": "k", "status": 500}]
        });
        let sanitized = sanitize_context(&input);
        assert_eq!(sanitized["clip_id"], "ClipA_01");
        assert_eq!(sanitized["headers"]["Authorization"], "[redacted]");
        assert_eq!(sanitized["headers"]["X-Request-ID"], "r1");
        assert_eq!(sanitized["attempts"][0]["api_key"], "[redacted]");
        assert_eq!(sanitized["attempts"][0]["status"], 500);
    }
}
