//! The daily manifest: the day's editorial contract.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::keys::is_valid_clip_id;

/// Current manifest schema version.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Bounds on the section list.
pub const MIN_SECTIONS: usize = 6;
pub const MAX_SECTIONS: usize = 12;

/// Bounds on section bullets.
pub const MIN_BULLETS: usize = 2;
pub const MAX_BULLETS: usize = 4;
pub const MIN_BULLET_CHARS: usize = 20;
pub const MAX_BULLET_CHARS: usize = 140;

/// Caps on manifest headline fields.
pub const MAX_TITLE_CHARS: usize = 80;
pub const MAX_HEADLINE_CHARS: usize = 60;
pub const MAX_SECTION_ENTITIES: usize = 10;

/// Kind of post a manifest renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PostKind {
    #[default]
    DailyRecap,
    ProductionRecap,
    WeeklySummary,
    TopicFocus,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::DailyRecap => "daily-recap",
            PostKind::ProductionRecap => "production-recap",
            PostKind::WeeklySummary => "weekly-summary",
            PostKind::TopicFocus => "topic-focus",
        }
    }
}

/// Review status of a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ManifestStatus {
    #[default]
    Draft,
    Approved,
}

/// How well a section's timestamps line up with its clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentStatus {
    /// A transcript anchors the timestamps
    Exact,
    /// Timestamps estimated from the clip duration
    Estimated,
    /// No timing information available
    Missing,
}

/// One item-backed section of the manifest.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManifestSection {
    /// Stable section identifier (`section-1`, ...)
    pub section_id: String,
    pub clip_id: String,
    pub title: String,
    /// 2..4 bullets, each 20..140 chars
    pub bullets: Vec<String>,
    pub paragraph: String,
    /// Selection score (0..100)
    pub score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pr_links: Option<Vec<String>>,
    pub clip_url: String,
    pub alignment_status: AlignmentStatus,
    /// Section start offset in seconds
    pub start: f64,
    /// Section end offset in seconds
    pub end: f64,
    /// Up to 10 extracted entities
    pub entities: Vec<String>,
}

/// Model-drafted prose attached to an approved-for-drafting manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Draft {
    pub intro: String,
    /// Exactly one paragraph per manifest section
    pub section_paragraphs: Vec<String>,
    pub outro: String,
}

/// Generation metadata proving how a draft was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenMeta {
    pub model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub seed: u64,
    pub max_tokens: u32,
    /// SHA-256 over the prompt and sampling parameters
    pub prompt_hash: String,
    /// SHA-256 over the manifest's editorial projection
    pub content_hash: String,
    pub generated_at: DateTime<Utc>,
}

/// Deterministic editorial judgment recorded by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestJudge {
    /// Composite editorial score (0..1)
    pub score: f64,
    /// Short verdict (`publish`, `review`)
    pub verdict: String,
    pub notes: Vec<String>,
    pub judged_at: DateTime<Utc>,
}

/// The day's editorial contract, stored at
/// `manifests/{YYYY}/{MM}/{post_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    pub schema_version: u32,
    /// `YYYY-MM-DD`
    pub post_id: String,
    pub post_kind: PostKind,
    /// Local noon in the target timezone, converted to UTC
    pub date_utc: DateTime<Utc>,
    /// IANA timezone the day window was computed in
    pub tz: String,
    /// ≤80 chars after trim
    pub title: String,
    /// ≤60 chars
    pub headline_short: String,
    pub summary: String,
    pub category: String,
    pub tags: Vec<String>,
    pub repos: Vec<String>,
    pub clip_ids: Vec<String>,
    /// Ordered sections, 6..12
    pub sections: Vec<ManifestSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_vod: Option<String>,
    pub md_path: String,
    pub target_branch: String,
    pub status: ManifestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge: Option<ManifestJudge>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<Draft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gen: Option<GenMeta>,
}

impl Manifest {
    /// Validate the manifest against the editorial contract.
    pub fn validate(&self) -> ModelResult<()> {
        if chrono::NaiveDate::parse_from_str(&self.post_id, "%Y-%m-%d").is_err() {
            return Err(ModelError::invalid_field(
                "post_id",
                format!("not a date: {}", self.post_id),
            ));
        }
        let title = self.title.trim();
        if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
            return Err(ModelError::invalid_field("title", "empty or over 80 chars"));
        }
        if self.headline_short.chars().count() > MAX_HEADLINE_CHARS {
            return Err(ModelError::invalid_field("headline_short", "over 60 chars"));
        }
        if self.sections.len() < MIN_SECTIONS || self.sections.len() > MAX_SECTIONS {
            return Err(ModelError::invalid_field(
                "sections",
                format!("{} sections, need 6..12", self.sections.len()),
            ));
        }
        for section in &self.sections {
            section.validate()?;
        }
        if let Some(draft) = &self.draft {
            if draft.section_paragraphs.len() != self.sections.len() {
                return Err(ModelError::invalid_field(
                    "draft",
                    "paragraph count does not match section count",
                ));
            }
        }
        Ok(())
    }
}

impl ManifestSection {
    pub fn validate(&self) -> ModelResult<()> {
        if !is_valid_clip_id(&self.clip_id) {
            return Err(ModelError::InvalidClipId(self.clip_id.clone()));
        }
        if self.bullets.len() < MIN_BULLETS || self.bullets.len() > MAX_BULLETS {
            return Err(ModelError::invalid_field(
                "bullets",
                format!("{} bullets in {}, need 2..4", self.bullets.len(), self.section_id),
            ));
        }
        for bullet in &self.bullets {
            let n = bullet.chars().count();
            if n < MIN_BULLET_CHARS || n > MAX_BULLET_CHARS {
                return Err(ModelError::invalid_field(
                    "bullets",
                    format!("bullet length {n} outside 20..140 in {}", self.section_id),
                ));
            }
        }
        if self.entities.len() > MAX_SECTION_ENTITIES {
            return Err(ModelError::invalid_field("entities", "more than 10"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_section(i: usize) -> ManifestSection {
        ManifestSection {
            section_id: format!("section-{}", i),
            clip_id: format!("Clip_{:02}", i),
            title: "Debugging The Deploy Pipeline".to_string(),
            bullets: vec![
                "Tracked the flaky deploy to a stale cache entry".to_string(),
                "Verified the fix against the staging environment".to_string(),
            ],
            paragraph: "A walk through the deploy failure and the cache fix.".to_string(),
            score: 80,
            repo: Some("acme/app".to_string()),
            pr_links: None,
            clip_url: format!("https://clips.example.tv/Clip_{:02}", i),
            alignment_status: AlignmentStatus::Exact,
            start: 0.0,
            end: 30.0,
            entities: vec!["deploy".to_string(), "cache".to_string()],
        }
    }

    fn sample_manifest(section_count: usize) -> Manifest {
        Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            post_id: "2024-05-10".to_string(),
            post_kind: PostKind::DailyRecap,
            date_utc: Utc.with_ymd_and_hms(2024, 5, 10, 19, 0, 0).unwrap(),
            tz: "America/New_York".to_string(),
            title: "Daily Dev Recap: 6 Clips with GitHub Context".to_string(),
            headline_short: "Daily Dev Recap: 6 Clips".to_string(),
            summary: "Six clips from today's stream.".to_string(),
            category: "development".to_string(),
            tags: vec!["devlog".to_string()],
            repos: vec!["acme/app".to_string()],
            clip_ids: (1..=section_count).map(|i| format!("Clip_{:02}", i)).collect(),
            sections: (1..=section_count).map(sample_section).collect(),
            canonical_vod: None,
            md_path: "content/blog/development/2024-05-10-daily-recap.md".to_string(),
            target_branch: "staging".to_string(),
            status: ManifestStatus::Draft,
            judge: None,
            draft: None,
            gen: None,
        }
    }

    #[test]
    fn test_valid_manifest() {
        assert!(sample_manifest(6).validate().is_ok());
        assert!(sample_manifest(12).validate().is_ok());
    }

    #[test]
    fn test_section_count_bounds() {
        assert!(sample_manifest(5).validate().is_err());
        assert!(sample_manifest(13).validate().is_err());
    }

    #[test]
    fn test_bullet_bounds() {
        let mut manifest = sample_manifest(6);
        manifest.sections[0].bullets = vec!["too short".to_string()];
        assert!(manifest.validate().is_err());

        let mut manifest = sample_manifest(6);
        manifest.sections[0].bullets = vec!["x".repeat(141), "y".repeat(30)];
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_draft_paragraph_count_must_match() {
        let mut manifest = sample_manifest(6);
        manifest.draft = Some(Draft {
            intro: "intro".to_string(),
            section_paragraphs: vec!["p".to_string(); 5],
            outro: "outro".to_string(),
        });
        assert!(manifest.validate().is_err());
    }
}
