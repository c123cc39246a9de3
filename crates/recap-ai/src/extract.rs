//! JSON extraction from model output.
//!
//! Models are told to return a bare JSON object and routinely wrap it in a
//! markdown fence anyway. Extraction tries a fenced block first, then falls
//! back to the first balanced-brace object in the text.

/// Extract the JSON object from raw model output.
pub fn extract_json(text: &str) -> Option<String> {
    if let Some(fenced) = extract_fenced(text) {
        return Some(fenced);
    }
    extract_balanced(text)
}

/// Pull the body out of a ```json ... ``` (or bare ```) fence.
fn extract_fenced(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    let candidate = body[..end].trim();
    if candidate.starts_with('{') {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// Scan for the first balanced `{...}` object, respecting strings and
/// escapes.
fn extract_balanced(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_json() {
        let text = "Here you go:\n```json\n{\"intro\": \"hi\"}\n```\nthanks";
        assert_eq!(extract_json(text).unwrap(), "{\"intro\": \"hi\"}");
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(text).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_balanced_braces() {
        let text = "noise before {\"a\": {\"b\": \"}\"}} noise after";
        assert_eq!(extract_json(text).unwrap(), "{\"a\": {\"b\": \"}\"}}");
    }

    #[test]
    fn test_escaped_quote_in_string() {
        let text = "{\"a\": \"quote \\\" brace }\"}";
        assert_eq!(extract_json(text).unwrap(), text);
    }

    #[test]
    fn test_no_json() {
        assert!(extract_json("just prose, no object").is_none());
        assert!(extract_json("unbalanced { forever").is_none());
    }
}
