//! Candidate scoring and diversity-constrained selection.

use std::collections::{HashMap, HashSet};

use chrono::Timelike;
use tracing::debug;

use recap_models::ContentItem;

use crate::entities::extract_entities;

/// Selection size bounds.
pub const CLIP_BUDGET_MIN: usize = 6;
pub const CLIP_BUDGET_MAX: usize = 12;

/// At most this many items per UTC hour.
pub const PER_HOUR_CAP: usize = 2;

/// Eligibility filters.
const MIN_DURATION_S: f64 = 10.0;
const MIN_SUMMARY_CHARS: usize = 20;

/// Bytes-per-word approximation for transcript length.
const BYTES_PER_WORD: f64 = 6.0;

/// Tolerance when validating that weights sum to 1.
const WEIGHT_EPSILON: f64 = 0.01;

/// Weights over the five normalized score components.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionWeights {
    pub content_score: f64,
    pub github_confidence: f64,
    pub duration: f64,
    pub views: f64,
    pub transcript_length: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            content_score: 0.3,
            github_confidence: 0.25,
            duration: 0.15,
            views: 0.15,
            transcript_length: 0.15,
        }
    }
}

impl SelectionWeights {
    fn sum(&self) -> f64 {
        self.content_score
            + self.github_confidence
            + self.duration
            + self.views
            + self.transcript_length
    }

    /// Validate the weights sum to 1 (within epsilon), normalizing
    /// otherwise. All-zero weights fall back to the defaults.
    pub fn normalized(mut self) -> Self {
        let sum = self.sum();
        if sum <= 0.0 {
            return Self::default();
        }
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            self.content_score /= sum;
            self.github_confidence /= sum;
            self.duration /= sum;
            self.views /= sum;
            self.transcript_length /= sum;
        }
        self
    }
}

/// Selector configuration.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub weights: SelectionWeights,
    pub clip_budget_min: usize,
    pub clip_budget_max: usize,
    pub per_hour_cap: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            weights: SelectionWeights::default(),
            clip_budget_min: CLIP_BUDGET_MIN,
            clip_budget_max: CLIP_BUDGET_MAX,
            per_hour_cap: PER_HOUR_CAP,
        }
    }
}

/// A candidate that passed the filters, with its score and entities.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub item: ContentItem,
    /// `round(100 * weighted component sum)`
    pub score: u32,
    pub entities: Vec<String>,
}

/// Score and select a day's candidates.
///
/// Emits between 0 and `clip_budget_max` candidates in admission order
/// (descending score, caps applied); whenever at least `clip_budget_min`
/// eligible hours/entities exist the result reaches the minimum budget.
pub fn select_candidates(items: Vec<ContentItem>, config: &SelectorConfig) -> Vec<ScoredCandidate> {
    let weights = config.weights.clone().normalized();

    // Eligibility: a usable transcript and a non-trivial duration
    let eligible: Vec<ContentItem> = items
        .into_iter()
        .filter(|item| has_transcript(item) && item.clip_duration >= MIN_DURATION_S)
        .collect();

    if eligible.is_empty() {
        return Vec::new();
    }

    // Normalization denominators come from the candidate set itself
    let max_duration = eligible
        .iter()
        .map(|i| i.clip_duration)
        .fold(f64::MIN, f64::max)
        .max(1.0);
    let max_views = eligible.iter().map(|i| i.clip_view_count).max().unwrap_or(0).max(1) as f64;
    let max_words = eligible
        .iter()
        .map(approx_words)
        .fold(f64::MIN, f64::max)
        .max(1.0);

    let mut scored: Vec<ScoredCandidate> = eligible
        .into_iter()
        .map(|item| {
            let components = [
                item.content_score.unwrap_or(0.0).clamp(0.0, 1.0),
                if item.github_context_url.is_some() { 1.0 } else { 0.0 },
                (item.clip_duration / max_duration).min(1.0),
                (item.clip_view_count as f64 / max_views).min(1.0),
                (approx_words(&item) / max_words).min(1.0),
            ];
            let weighted = components[0] * weights.content_score
                + components[1] * weights.github_confidence
                + components[2] * weights.duration
                + components[3] * weights.views
                + components[4] * weights.transcript_length;
            let entities = extract_entities(
                &item.clip_title,
                item.transcript_summary.as_deref(),
                item.github_context_url.is_some(),
            );
            ScoredCandidate {
                score: (weighted * 100.0).round() as u32,
                entities,
                item,
            }
        })
        .collect();

    // Descending by score; clip id breaks ties so selection is stable
    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.item.clip_id.cmp(&b.item.clip_id))
    });

    // Greedy admission under the diversity caps
    let mut selected: Vec<ScoredCandidate> = Vec::new();
    let mut per_hour: HashMap<(i64, u32), usize> = HashMap::new();
    let mut seen_entities: HashSet<String> = HashSet::new();

    for candidate in scored {
        if selected.len() >= config.clip_budget_max {
            break;
        }

        let hour_key = (
            candidate.item.clip_created_at.timestamp() / 86_400,
            candidate.item.clip_created_at.hour(),
        );
        let in_hour = per_hour.get(&hour_key).copied().unwrap_or(0);
        if in_hour >= config.per_hour_cap {
            debug!(clip_id = %candidate.item.clip_id, "Skipped by per-hour cap");
            continue;
        }

        // Past the minimum budget, a candidate must bring something new
        if selected.len() >= config.clip_budget_min {
            let novel = candidate
                .entities
                .iter()
                .any(|e| !seen_entities.contains(e));
            if !novel {
                debug!(clip_id = %candidate.item.clip_id, "Skipped by entity-novelty cap");
                continue;
            }
        }

        *per_hour.entry(hour_key).or_insert(0) += 1;
        seen_entities.extend(candidate.entities.iter().cloned());
        selected.push(candidate);
    }

    selected
}

fn has_transcript(item: &ContentItem) -> bool {
    item.transcript_summary
        .as_deref()
        .map(|s| s.chars().count() >= MIN_SUMMARY_CHARS)
        .unwrap_or(false)
        || item
            .transcript_url
            .as_deref()
            .map(|u| !u.is_empty())
            .unwrap_or(false)
}

fn approx_words(item: &ContentItem) -> f64 {
    match item.transcript_size_bytes {
        Some(bytes) => bytes as f64 / BYTES_PER_WORD,
        None => item
            .transcript_summary
            .as_deref()
            .map(|s| s.split_whitespace().count() as f64)
            .unwrap_or(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use recap_models::{ContentItem, ProcessingStatus, CONTENT_ITEM_SCHEMA_VERSION};

    fn item(clip_id: &str, hour: u32, title: &str, summary: &str) -> ContentItem {
        ContentItem {
            schema_version: CONTENT_ITEM_SCHEMA_VERSION,
            clip_id: clip_id.to_string(),
            clip_title: title.to_string(),
            clip_url: format!("https://clips.example.tv/{clip_id}"),
            clip_duration: 60.0,
            clip_created_at: Utc.with_ymd_and_hms(2024, 5, 10, hour, 15, 0).unwrap(),
            clip_view_count: 100,
            processing_status: ProcessingStatus::ReadyForContent,
            transcript_url: Some(format!("https://store/transcripts/{clip_id}.json")),
            transcript_summary: Some(summary.to_string()),
            transcript_size_bytes: Some(600),
            github_context_url: None,
            github_summary: None,
            content_score: Some(0.8),
            content_category: None,
            stored_at: Utc::now(),
            enhanced_at: None,
            error: None,
        }
    }

    #[test]
    fn test_filters_drop_short_and_transcriptless() {
        let mut no_transcript = item("Clip_A", 10, "title one", "");
        no_transcript.transcript_summary = None;
        no_transcript.transcript_url = None;

        let mut too_short = item("Clip_B", 10, "title two", "a perfectly fine summary here");
        too_short.clip_duration = 5.0;

        let good = item("Clip_C", 10, "title three", "a perfectly fine summary here");

        let selected = select_candidates(
            vec![no_transcript, too_short, good],
            &SelectorConfig::default(),
        );
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].item.clip_id, "Clip_C");
    }

    #[test]
    fn test_per_hour_cap_limits_one_hour() {
        // 20 high-scoring candidates, all inside one UTC hour
        let items: Vec<ContentItem> = (0..20)
            .map(|i| {
                item(
                    &format!("Clip_{i:02}"),
                    14,
                    &format!("unique topic {i} alpha"),
                    &format!("summary about topic number {i} with detail"),
                )
            })
            .collect();

        let selected = select_candidates(items, &SelectorConfig::default());
        assert_eq!(selected.len(), PER_HOUR_CAP);
    }

    #[test]
    fn test_selection_reaches_budget_across_hours() {
        let items: Vec<ContentItem> = (0..14)
            .map(|i| {
                item(
                    &format!("Clip_{i:02}"),
                    8 + (i as u32 % 7),
                    &format!("distinct subject {i} refactor"),
                    &format!("talking through subject number {i} in depth"),
                )
            })
            .collect();

        let selected = select_candidates(items, &SelectorConfig::default());
        assert!(selected.len() >= CLIP_BUDGET_MIN);
        assert!(selected.len() <= CLIP_BUDGET_MAX);

        // Per-hour cap holds in the emitted list
        let mut per_hour: HashMap<u32, usize> = HashMap::new();
        for s in &selected {
            *per_hour.entry(s.item.clip_created_at.hour()).or_insert(0) += 1;
        }
        assert!(per_hour.values().all(|&c| c <= PER_HOUR_CAP));
    }

    #[test]
    fn test_novelty_cap_after_minimum() {
        // Seven hours of pairs with identical vocabulary; after the minimum
        // budget, the repeats bring nothing new and are skipped.
        let items: Vec<ContentItem> = (0..14)
            .map(|i| {
                item(
                    &format!("Clip_{i:02}"),
                    8 + (i as u32 % 7),
                    "same cache deploy story",
                    "identical summary about cache and deploy work",
                )
            })
            .collect();

        let selected = select_candidates(items, &SelectorConfig::default());
        assert_eq!(selected.len(), CLIP_BUDGET_MIN);
    }

    #[test]
    fn test_scores_sorted_descending() {
        let mut low = item("Clip_A", 9, "alpha beta gamma", "some summary words here today");
        low.content_score = Some(0.1);
        low.clip_view_count = 5;
        let mut high = item("Clip_B", 10, "delta epsilon zeta", "other summary words here today");
        high.content_score = Some(0.9);
        high.clip_view_count = 500;

        let selected = select_candidates(vec![low, high], &SelectorConfig::default());
        assert_eq!(selected[0].item.clip_id, "Clip_B");
        assert!(selected[0].score >= selected[1].score);
    }

    #[test]
    fn test_weights_normalize() {
        let weights = SelectionWeights {
            content_score: 3.0,
            github_confidence: 1.0,
            duration: 1.0,
            views: 0.5,
            transcript_length: 0.5,
        }
        .normalized();
        assert!((weights.sum() - 1.0).abs() < 1e-9);

        let zeroed = SelectionWeights {
            content_score: 0.0,
            github_confidence: 0.0,
            duration: 0.0,
            views: 0.0,
            transcript_length: 0.0,
        }
        .normalized();
        assert_eq!(zeroed, SelectionWeights::default());
    }
}
