//! The daily five-stage pipeline the worker sequences.
//!
//! Stage boundaries live in the worker so cancellation and progress stay
//! cooperative; this module owns what each stage does.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info};

use recap_content::{ContentItemManager, SelectorConfig};
use recap_github::EventCorrelator;
use recap_models::{
    blog_post_key, manifest_key, ContentItem, ContentItemUpdate, ContentCategory, Manifest,
    PostKind, ProcessingStatus,
};
use recap_storage::ArtifactStore;

use crate::draft::Drafter;
use crate::error::{PipelineError, PipelineResult};
use crate::judge::judge_manifest;
use crate::manifest::ManifestBuilder;
use crate::render::render_manifest;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// IANA timezone the blog day is computed in
    pub timezone: String,
    /// Repositories this broadcaster streams about
    pub watched_repos: Vec<String>,
    /// Selector weights and budgets
    pub selector: SelectorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            watched_repos: Vec::new(),
            selector: SelectorConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            timezone: std::env::var("BLOG_TIMEZONE")
                .unwrap_or_else(|_| "America/New_York".to_string()),
            watched_repos: std::env::var("GITHUB_REPOS")
                .map(|s| s.split(',').map(|r| r.trim().to_string()).collect())
                .unwrap_or_default(),
            selector: SelectorConfig::default(),
        }
    }
}

/// Result payload stored on a completed generation job.
#[derive(Debug, Clone)]
pub struct GenerateOutcome {
    pub manifest: Manifest,
    pub manifest_url: String,
    pub blog_post_url: String,
    pub markdown_bytes: u64,
}

impl GenerateOutcome {
    /// Job `results` payload exposed to status observers.
    pub fn to_results_json(&self) -> serde_json::Value {
        json!({
            "post_id": self.manifest.post_id,
            "sections": self.manifest.sections.len(),
            "manifest_url": self.manifest_url,
            "blog_post_url": self.blog_post_url,
            "markdown_bytes": self.markdown_bytes,
            "judge": self.manifest.judge.as_ref().map(|j| json!({
                "score": j.score,
                "verdict": j.verdict,
            })),
        })
    }
}

/// Owns the stage implementations for the daily recap.
pub struct DailyPipeline {
    store: Arc<ArtifactStore>,
    items: ContentItemManager,
    correlator: EventCorrelator,
    builder: ManifestBuilder,
    drafter: Drafter,
    config: PipelineConfig,
}

impl DailyPipeline {
    pub fn new(
        store: Arc<ArtifactStore>,
        items: ContentItemManager,
        correlator: EventCorrelator,
        drafter: Drafter,
        config: PipelineConfig,
    ) -> Self {
        let builder = ManifestBuilder::new(
            Arc::clone(&store),
            items.clone(),
            config.selector.clone(),
            config.watched_repos.clone(),
        );
        Self {
            store,
            items,
            correlator,
            builder,
            drafter,
            config,
        }
    }

    pub fn parse_timezone(&self, tz: &str) -> PipelineResult<Tz> {
        tz.parse()
            .map_err(|_| PipelineError::InvalidTimezone(tz.to_string()))
    }

    pub fn default_timezone(&self) -> PipelineResult<Tz> {
        self.parse_timezone(&self.config.timezone)
    }

    /// Stage 1: fetch the day's items and enhance any transcribed clips
    /// that still lack repository context.
    pub async fn fetch_content_items(
        &self,
        date: NaiveDate,
        tz: Tz,
    ) -> PipelineResult<Vec<ContentItem>> {
        let items = self.builder.fetch_day_items(date, tz).await?;

        let mut ready = Vec::with_capacity(items.len());
        for item in items {
            let item = if item.processing_status == ProcessingStatus::Transcribed {
                self.enhance_item(item).await?
            } else {
                item
            };
            ready.push(item);
        }
        Ok(ready)
    }

    /// Stage 2: build and persist-ready manifest for the date.
    pub async fn build_manifest(
        &self,
        date: NaiveDate,
        tz: Tz,
        post_kind: PostKind,
        items: Vec<ContentItem>,
    ) -> PipelineResult<Manifest> {
        self.builder.build(date, tz, post_kind, items).await
    }

    /// Stage 3: judge the manifest and attach the (idempotent) draft.
    pub async fn judge_and_draft(&self, manifest: &mut Manifest) -> PipelineResult<()> {
        manifest.judge = Some(judge_manifest(manifest));
        let regenerated = self.drafter.generate_draft(manifest).await?;
        debug!(post_id = %manifest.post_id, regenerated, "Draft attached");
        Ok(())
    }

    /// Stage 4: render the Markdown and persist both review artifacts.
    ///
    /// The manifest and the rendered document are written only after the
    /// manifest re-validates with its draft attached.
    pub async fn prepare_response(&self, manifest: &Manifest) -> PipelineResult<GenerateOutcome> {
        manifest.validate()?;
        let markdown = render_manifest(manifest)?;

        let manifest_key = manifest_key(&manifest.post_id)?;
        self.store
            .put(
                &manifest_key,
                serde_json::to_vec_pretty(manifest)?,
                "application/json",
                HashMap::from([("post-id".to_string(), manifest.post_id.clone())]),
            )
            .await?;

        let post_key = blog_post_key(&manifest.post_id)?;
        let markdown_bytes = markdown.len() as u64;
        self.store
            .put(
                &post_key,
                markdown.into_bytes(),
                "text/markdown; charset=utf-8",
                HashMap::from([
                    ("post-id".to_string(), manifest.post_id.clone()),
                    ("target-branch".to_string(), manifest.target_branch.clone()),
                ]),
            )
            .await?;

        info!(post_id = %manifest.post_id, markdown_bytes, "Persisted review artifacts");
        Ok(GenerateOutcome {
            manifest: manifest.clone(),
            manifest_url: self.store.object_url(&manifest_key),
            blog_post_url: self.store.object_url(&post_key),
            markdown_bytes,
        })
    }

    /// Correlate one transcribed item and advance it to
    /// `ready_for_content`.
    ///
    /// A clip with no qualifying events still advances; it simply carries
    /// no context URL and scores lower at selection.
    async fn enhance_item(&self, item: ContentItem) -> PipelineResult<ContentItem> {
        let repo_filter = self.config.watched_repos.first().map(String::as_str);
        let context = self
            .correlator
            .find_events_for_clip(&item.clip_id, item.clip_created_at, repo_filter)
            .await?;

        let mut update = ContentItemUpdate {
            processing_status: Some(ProcessingStatus::Enhanced),
            content_score: Some(content_score(&item, context.total_links())),
            content_category: Some(categorize(&item, !context.is_empty())),
            enhanced_at: Some(Utc::now()),
            ..Default::default()
        };

        if !context.is_empty() {
            let key = format!("github-context/{}.json", item.clip_id);
            self.store
                .put(
                    &key,
                    serde_json::to_vec(&context)?,
                    "application/json",
                    HashMap::from([("clip-id".to_string(), item.clip_id.clone())]),
                )
                .await?;
            update.github_context_url = Some(self.store.object_url(&key));
            update.github_summary = Some(context.summary());
        }

        self.items
            .update(&item.clip_id, item.clip_created_at, update)
            .await?;

        // Enhancement succeeded in full; the item is eligible for selection
        let ready = self
            .items
            .update(
                &item.clip_id,
                item.clip_created_at,
                ContentItemUpdate {
                    processing_status: Some(ProcessingStatus::ReadyForContent),
                    ..Default::default()
                },
            )
            .await?;
        debug!(clip_id = %ready.clip_id, links = context.total_links(), "Enhanced item");
        Ok(ready)
    }
}

/// Deterministic editorial score assigned during enhancement.
///
/// Repository links dominate; a longer clip with a real transcript edges
/// out a drive-by.
fn content_score(item: &ContentItem, link_count: usize) -> f64 {
    let link_part = (link_count.min(3) as f64) * 0.15;
    let duration_part = (item.clip_duration / 600.0).min(0.2);
    let transcript_part = if item.transcript_size_bytes.unwrap_or(0) > 500 {
        0.15
    } else {
        0.05
    };
    (0.3 + link_part + duration_part + transcript_part).min(1.0)
}

/// Keyword-driven category assignment.
fn categorize(item: &ContentItem, has_context: bool) -> ContentCategory {
    let haystack = format!(
        "{} {}",
        item.clip_title.to_lowercase(),
        item.transcript_summary.as_deref().unwrap_or("").to_lowercase()
    );

    if ["tutorial", "how to", "walkthrough", "guide"]
        .iter()
        .any(|k| haystack.contains(k))
    {
        ContentCategory::Tutorial
    } else if ["review", "first look", "impressions"]
        .iter()
        .any(|k| haystack.contains(k))
    {
        ContentCategory::Review
    } else if has_context
        || ["code", "deploy", "debug", "refactor", "build", "bug"]
            .iter()
            .any(|k| haystack.contains(k))
    {
        ContentCategory::Development
    } else if ["game", "gaming", "play"].iter().any(|k| haystack.contains(k)) {
        ContentCategory::Gaming
    } else {
        ContentCategory::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recap_models::CONTENT_ITEM_SCHEMA_VERSION;

    fn item(title: &str, summary: &str) -> ContentItem {
        ContentItem {
            schema_version: CONTENT_ITEM_SCHEMA_VERSION,
            clip_id: "ClipA_01".to_string(),
            clip_title: title.to_string(),
            clip_url: "https://clips.twitch.tv/ClipA_01".to_string(),
            clip_duration: 120.0,
            clip_created_at: Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap(),
            clip_view_count: 10,
            processing_status: ProcessingStatus::Transcribed,
            transcript_url: None,
            transcript_summary: Some(summary.to_string()),
            transcript_size_bytes: Some(900),
            github_context_url: None,
            github_summary: None,
            content_score: None,
            content_category: None,
            stored_at: Utc::now(),
            enhanced_at: None,
            error: None,
        }
    }

    #[test]
    fn test_content_score_monotone_in_links() {
        let i = item("t", "s");
        assert!(content_score(&i, 3) > content_score(&i, 1));
        assert!(content_score(&i, 1) > content_score(&i, 0));
        assert!(content_score(&i, 10) <= 1.0);
    }

    #[test]
    fn test_categorize_keywords() {
        assert_eq!(
            categorize(&item("rust tutorial stream", ""), false),
            ContentCategory::Tutorial
        );
        assert_eq!(
            categorize(&item("debugging the deploy", ""), false),
            ContentCategory::Development
        );
        assert_eq!(
            categorize(&item("anything", ""), true),
            ContentCategory::Development
        );
        assert_eq!(
            categorize(&item("playing the new game", ""), false),
            ContentCategory::Gaming
        );
        assert_eq!(categorize(&item("chatting", ""), false), ContentCategory::Other);
    }
}
