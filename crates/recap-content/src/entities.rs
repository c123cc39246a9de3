//! Entity extraction for the novelty diversity cap.

use std::collections::HashMap;

/// Cap on entities per item.
pub const MAX_ENTITIES: usize = 10;

/// Token length bounds.
const MIN_TOKEN_LEN: usize = 3;
const MAX_TOKEN_LEN: usize = 20;

/// How many top tokens each source contributes.
const TITLE_TOP: usize = 5;
const TRANSCRIPT_TOP: usize = 20;

/// English and technical filler dropped before counting.
const STOPLIST: [&str; 58] = [
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "now", "new", "old", "see", "two",
    "way", "who", "this", "that", "with", "have", "from", "they", "will", "would", "there",
    "their", "what", "about", "which", "when", "were", "been", "more", "some", "them", "then",
    "than", "into", "just", "like", "over", "also", "going", "gonna", "yeah", "okay",
];

/// Extract up to 10 entities from an item's title and transcript summary.
///
/// Tokens are lowercased, split on non-word characters, stoplisted, pruned
/// of numeric and repeated-character runs, and bounded to 3..20 chars. The
/// top title tokens and top transcript tokens by frequency are merged after
/// any fixed context tags, deduplicated in order.
pub fn extract_entities(
    title: &str,
    transcript_summary: Option<&str>,
    has_github_context: bool,
) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();

    // Fixed context tags lead the list
    if has_github_context {
        entities.push("github-context".to_string());
    }

    entities.extend(top_tokens(title, TITLE_TOP));
    if let Some(summary) = transcript_summary {
        entities.extend(top_tokens(summary, TRANSCRIPT_TOP));
    }

    // Order-preserving dedupe, capped
    let mut seen = std::collections::HashSet::new();
    entities.retain(|e| seen.insert(e.clone()));
    entities.truncate(MAX_ENTITIES);
    entities
}

/// Top `n` qualifying tokens by frequency, ties broken by first appearance.
fn top_tokens(text: &str, n: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    for token in tokenize(text) {
        let entry = counts.entry(token).or_insert_with(|| {
            order += 1;
            (0, order)
        });
        entry.0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(n).map(|(token, _)| token).collect()
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .into_iter()
        .filter(qualifies)
}

fn qualifies(token: &String) -> bool {
    let len = token.chars().count();
    if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&len) {
        return false;
    }
    if STOPLIST.contains(&token.as_str()) {
        return false;
    }
    // Purely numeric tokens carry no topical signal
    if token.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    // Repeated-character runs ("aaa", "hmmm") are filler
    let first = token.chars().next().unwrap_or_default();
    if token.chars().all(|c| c == first) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stoplist_and_numeric_dropped() {
        let entities = extract_entities("the deploy and 12345 pipeline", None, false);
        assert_eq!(entities, vec!["deploy".to_string(), "pipeline".to_string()]);
    }

    #[test]
    fn test_repeated_char_tokens_dropped() {
        let entities = extract_entities("hmmm aaa deploy", None, false);
        assert_eq!(entities, vec!["deploy".to_string()]);
    }

    #[test]
    fn test_github_tag_leads() {
        let entities = extract_entities("deploy pipeline", None, true);
        assert_eq!(entities[0], "github-context");
        assert!(entities.contains(&"deploy".to_string()));
    }

    #[test]
    fn test_frequency_ranking() {
        let summary = "cache cache cache deploy deploy worker";
        let entities = extract_entities("title", Some(summary), false);
        // "title" qualifies from the title; transcript tokens rank by count
        let cache_pos = entities.iter().position(|e| e == "cache").unwrap();
        let worker_pos = entities.iter().position(|e| e == "worker").unwrap();
        assert!(cache_pos < worker_pos);
    }

    #[test]
    fn test_cap_and_dedupe() {
        let summary = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda alpha";
        let entities = extract_entities("alpha beta", Some(summary), true);
        assert!(entities.len() <= MAX_ENTITIES);
        let mut deduped = entities.clone();
        deduped.dedup();
        assert_eq!(entities, deduped);
    }

    #[test]
    fn test_length_bounds() {
        let entities = extract_entities("ab abc abcdefghijklmnopqrstu", None, false);
        assert_eq!(entities, vec!["abc".to_string()]);
    }
}
