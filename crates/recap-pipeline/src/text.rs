//! Text normalization for titles, bullets, and model output.

/// Cap applied to every sanitized string.
const MAX_SANITIZED_CHARS: usize = 500;

/// Spoken fillers stripped from the front of clip titles. Longest first so
/// "let me" wins over "let's" never matching inside it.
const LEAD_FILLERS: [&str; 10] = [
    "let me", "i am", "let's", "okay", "right", "yo", "hey", "so", "now", "i'm",
];

/// Interjections stripped from the tail of clip titles.
const TRAILING_INTERJECTIONS: [&str; 8] = [
    "lol", "haha", "lmao", "omg", "wow", "hmm", "yeah", "though",
];

/// Normalize a clip title into a section heading.
///
/// Strips lead fillers and trailing interjections, title-cases the words,
/// and clamps to the given length with an ellipsis.
pub fn normalize_title(raw: &str, max_chars: usize) -> String {
    let mut words: Vec<&str> = raw.split_whitespace().collect();

    // Lead fillers can stack ("okay so let's ...")
    loop {
        let mut stripped = false;
        for filler in LEAD_FILLERS {
            let filler_words: Vec<&str> = filler.split(' ').collect();
            if words.len() > filler_words.len()
                && words
                    .iter()
                    .zip(&filler_words)
                    .all(|(w, f)| w.trim_matches(',').eq_ignore_ascii_case(f))
            {
                words.drain(..filler_words.len());
                stripped = true;
                break;
            }
        }
        if !stripped {
            break;
        }
    }

    while let Some(last) = words.last() {
        let bare = last.trim_matches(|c: char| !c.is_alphanumeric());
        if words.len() > 1
            && TRAILING_INTERJECTIONS
                .iter()
                .any(|i| bare.eq_ignore_ascii_case(i))
        {
            words.pop();
        } else {
            break;
        }
    }

    let titled: Vec<String> = words.iter().map(|w| title_case_word(w)).collect();
    clamp_with_ellipsis(&titled.join(" "), max_chars)
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Clamp to `max_chars`, appending an ellipsis when truncated.
pub fn clamp_with_ellipsis(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut clamped: String = chars[..keep].iter().collect();
    clamped.push_str("...");
    clamped
}

/// Split free text into trimmed sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '!', '?'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Sanitize a string destined for the manifest or the rendered document.
///
/// Fancy punctuation is normalized to ASCII, whitespace collapses to single
/// spaces, characters outside the allowed set are dropped, and the result
/// is clamped to 500 chars.
pub fn sanitize_text(input: &str) -> String {
    let mut normalized = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' => normalized.push('\''),
            '\u{201C}' | '\u{201D}' | '\u{201E}' => normalized.push('"'),
            '\u{2013}' | '\u{2014}' | '\u{2212}' => normalized.push('-'),
            '\u{2026}' => normalized.push_str("..."),
            '\u{00A0}' => normalized.push(' '),
            _ => normalized.push(c),
        }
    }

    let filtered: String = normalized
        .chars()
        .filter(|c| {
            c.is_alphanumeric()
                || c.is_whitespace()
                || matches!(
                    c,
                    '.' | ','
                        | ':'
                        | ';'
                        | '!'
                        | '?'
                        | '\''
                        | '"'
                        | '('
                        | ')'
                        | '-'
                        | '/'
                        | '&'
                        | '%'
                        | '#'
                        | '@'
                        | '+'
                        | '='
                        | '_'
                        | '['
                        | ']'
                )
        })
        .collect();

    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    clamp_with_ellipsis(&collapsed, MAX_SANITIZED_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lead_fillers_stripped() {
        assert_eq!(
            normalize_title("so let's fix the deploy pipeline", 80),
            "Fix The Deploy Pipeline"
        );
        assert_eq!(
            normalize_title("okay, now debugging the cache", 80),
            "Debugging The Cache"
        );
    }

    #[test]
    fn test_trailing_interjections_stripped() {
        assert_eq!(
            normalize_title("breaking the build again lol", 80),
            "Breaking The Build Again"
        );
    }

    #[test]
    fn test_filler_only_title_keeps_last_word() {
        // Stripping never empties the title
        assert_eq!(normalize_title("so", 80), "So");
    }

    #[test]
    fn test_clamp_with_ellipsis() {
        let long = "word ".repeat(40);
        let clamped = normalize_title(&long, 80);
        assert_eq!(clamped.chars().count(), 80);
        assert!(clamped.ends_with("..."));
    }

    #[test]
    fn test_sentence_split() {
        let sentences = split_sentences("First thing. Second thing! Third? ");
        assert_eq!(sentences, vec!["First thing", "Second thing", "Third"]);
    }

    #[test]
    fn test_sanitize_normalizes_punctuation() {
        assert_eq!(
            sanitize_text("\u{201C}smart\u{201D} quotes \u{2014} and \u{2026}"),
            "\"smart\" quotes - and ..."
        );
    }

    #[test]
    fn test_sanitize_collapses_whitespace_and_drops_controls() {
        assert_eq!(sanitize_text("a\tb\n\nc\u{0000}d <tag>"), "a b cd tag");
    }

    #[test]
    fn test_sanitize_clamps() {
        let out = sanitize_text(&"x".repeat(600));
        assert_eq!(out.chars().count(), 500);
        assert!(out.ends_with("..."));
    }
}
