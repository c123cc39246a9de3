//! Deterministic PII redaction for persisted and embedded text.
//!
//! Redaction MUST be deterministic and idempotent: the same input always
//! produces the same output, and redacting already-redacted text is a no-op.
//! Every transcript artifact and every model-bound string passes through
//! [`redact_text`] before it leaves the process.
//!
//! The crate also provides:
//! - [`sanitize_context`] - deep key-name masking of JSON trees for logging
//! - [`ErrorTracker`] - a bounded, swept record of recent errors

pub mod context;
pub mod tracker;

pub use context::{is_sensitive_key, sanitize_context};
pub use tracker::{ErrorTracker, TrackedError, TRACKER_CAPACITY, TRACKER_TTL_HOURS};

use std::sync::LazyLock;

use regex::Regex;

/// Email addresses.
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap()
});

/// Dotted-quad IPv4 candidates; octet range is validated per match.
static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})\b").unwrap()
});

/// Long alphanumeric secrets; digit+letter requirement is checked per match.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9._-]{20,}").unwrap());

/// URLs that carry a credential-looking keyword anywhere.
static SECRET_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://\S*(password|token|key|secret)\S*").unwrap()
});

/// Common database connection strings.
static DSN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(postgresql|mysql)://\S+").unwrap());

/// Environment-style secret assignments.
static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(SECRET_KEY|ACCESS_TOKEN|PRIVATE_KEY|API_KEY|SECRET|TOKEN|PASSWORD|KEY)=\S+")
        .unwrap()
});

/// Apply the full rewrite chain to free text.
///
/// Rules run in a fixed order: email, IPv4, long secrets, credential URLs,
/// database DSNs, environment assignments. The order matters: an email's
/// local part must become `[email]` before the secret rule can see it, and
/// credential URLs must be collapsed before DSNs are considered.
pub fn redact_text(input: &str) -> String {
    let text = EMAIL_RE.replace_all(input, "[email]");

    let text = IPV4_RE.replace_all(&text, |caps: &regex::Captures<'_>| {
        let valid = (1..=4).all(|i| caps[i].parse::<u16>().map(|o| o <= 255).unwrap_or(false));
        if valid {
            "[ip]".to_string()
        } else {
            caps[0].to_string()
        }
    });

    let text = TOKEN_RE.replace_all(&text, |caps: &regex::Captures<'_>| {
        let m = &caps[0];
        let has_digit = m.chars().any(|c| c.is_ascii_digit());
        let has_alpha = m.chars().any(|c| c.is_ascii_alphabetic());
        if has_digit && has_alpha {
            "[token]".to_string()
        } else {
            m.to_string()
        }
    });

    let text = SECRET_URL_RE.replace_all(&text, "[url]");
    let text = DSN_RE.replace_all(&text, "[db_connection]");
    let text = ENV_VAR_RE.replace_all(&text, "[env_var]");

    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_redacted() {
        assert_eq!(redact_text("mail me at dev@example.com!"), "mail me at [email]!");
    }

    #[test]
    fn test_valid_ipv4_redacted() {
        assert_eq!(redact_text("host is 192.168.1.100 ok"), "host is [ip] ok");
    }

    #[test]
    fn test_invalid_ipv4_left_alone() {
        assert_eq!(redact_text("version 999.1.2.3"), "version 999.1.2.3");
    }

    #[test]
    fn test_long_secret_redacted() {
        let input = "key sk1abcdefghijklmnop234 end";
        assert_eq!(redact_text(input), "key [token] end");
    }

    #[test]
    fn test_letters_only_run_kept() {
        // No digit: not a secret, even at length
        let input = "abcdefghijklmnopqrstuvwxyz";
        assert_eq!(redact_text(input), input);
    }

    #[test]
    fn test_secret_url_redacted() {
        assert_eq!(
            redact_text("see https://example.com/reset?password=hunter2 now"),
            "see [url] now"
        );
    }

    #[test]
    fn test_dsn_redacted() {
        assert_eq!(
            redact_text("db postgresql://user:pw@db.internal:5432/app"),
            "db [db_connection]"
        );
        assert_eq!(redact_text("MySQL://root@localhost"), "[db_connection]");
    }

    #[test]
    fn test_env_assignment_redacted() {
        assert_eq!(redact_text("export API_KEY=abc123"), "export [env_var]");
        assert_eq!(redact_text("PASSWORD=hunter2"), "[env_var]");
    }

    #[test]
    fn test_plain_speech_untouched() {
        let input = "so today we fixed the deploy pipeline and shipped it";
        assert_eq!(redact_text(input), input);
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let inputs = [
            "dev@example.com from 10.0.0.1 using sk1abcdefghijklmnop234",
            "https://x.io?token=a1b2c3d4e5f6g7h8i9j0k and postgresql://u:p@h/db",
            "SECRET=shh TOKEN=t0ps3cr3tvaluehere123",
            "nothing sensitive here",
        ];
        for input in inputs {
            let once = redact_text(input);
            let twice = redact_text(&once);
            assert_eq!(once, twice, "not idempotent for: {input}");
        }
    }
}
