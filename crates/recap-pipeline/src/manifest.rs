//! Manifest assembly: day window, selection, and section building.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use recap_content::{select_candidates, ContentItemManager, ItemQuery, ScoredCandidate, SelectorConfig};
use recap_models::{
    AlignmentStatus, GitHubContext, Manifest, ManifestSection, ManifestStatus, PostKind,
    MANIFEST_SCHEMA_VERSION, MAX_HEADLINE_CHARS, MAX_SECTIONS, MAX_TITLE_CHARS, MIN_SECTIONS,
};
use recap_storage::ArtifactStore;

use crate::error::{PipelineError, PipelineResult};
use crate::text::{clamp_with_ellipsis, normalize_title, sanitize_text, split_sentences};

/// Bullet bounds come from the manifest schema.
const MIN_BULLET_CHARS: usize = 20;
const MAX_BULLET_CHARS: usize = 140;
const MAX_BULLETS: usize = 4;

/// Builds the day's manifest from stored content items.
pub struct ManifestBuilder {
    store: Arc<ArtifactStore>,
    items: ContentItemManager,
    selector: SelectorConfig,
    /// Repositories this broadcaster streams about, used for section
    /// attribution
    watched_repos: Vec<String>,
}

impl ManifestBuilder {
    pub fn new(
        store: Arc<ArtifactStore>,
        items: ContentItemManager,
        selector: SelectorConfig,
        watched_repos: Vec<String>,
    ) -> Self {
        Self {
            store,
            items,
            selector,
            watched_repos,
        }
    }

    /// Fetch the day's content items (the local day converted to UTC).
    pub async fn fetch_day_items(
        &self,
        date: NaiveDate,
        tz: Tz,
    ) -> PipelineResult<Vec<recap_models::ContentItem>> {
        let (window_start, window_end) = day_window(date, tz)?;

        let query = ItemQuery {
            date_range: Some((
                window_start.date_naive(),
                window_end.date_naive(),
            )),
            limit: Some(recap_content::items::MAX_LIST_LIMIT),
            ..Default::default()
        };
        let page = self.items.list(query).await?;

        // The month listing is date-granular; trim to the exact window
        let items: Vec<_> = page
            .items
            .into_iter()
            .filter(|item| {
                item.clip_created_at >= window_start && item.clip_created_at < window_end
            })
            .collect();

        debug!(date = %date, count = items.len(), "Fetched day's content items");
        Ok(items)
    }

    /// Build and validate the manifest for a date.
    pub async fn build(
        &self,
        date: NaiveDate,
        tz: Tz,
        post_kind: PostKind,
        items: Vec<recap_models::ContentItem>,
    ) -> PipelineResult<Manifest> {
        let selected = select_candidates(items, &self.selector);
        if selected.len() < MIN_SECTIONS {
            return Err(PipelineError::InsufficientContent {
                found: selected.len(),
                need: MIN_SECTIONS,
            });
        }

        let mut sections = Vec::with_capacity(selected.len().min(MAX_SECTIONS));
        for (index, candidate) in selected.into_iter().take(MAX_SECTIONS).enumerate() {
            let context = self.fetch_context(&candidate).await;
            sections.push(build_section(index, &candidate, context.as_ref(), &self.watched_repos));
        }

        let github_count = sections.iter().filter(|s| s.repo.is_some()).count();
        let title = if github_count > 0 {
            format!(
                "Daily Dev Recap: {} Clips with GitHub Context",
                sections.len()
            )
        } else {
            format!("Daily Dev Recap: {} Clips from the Stream", sections.len())
        };
        let title = clamp_with_ellipsis(title.trim(), MAX_TITLE_CHARS);
        let headline_short: String = title.chars().take(MAX_HEADLINE_CHARS).collect();

        let summary = sanitize_text(&format!(
            "Highlights from {}: {} clips, {} with linked repository activity.",
            date,
            sections.len(),
            github_count
        ));

        let manifest = Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            post_id: date.format("%Y-%m-%d").to_string(),
            post_kind,
            date_utc: local_noon_utc(date, tz)?,
            tz: tz.name().to_string(),
            title,
            headline_short,
            summary,
            category: "development".to_string(),
            tags: vec!["devlog".to_string(), post_kind.as_str().to_string()],
            repos: self.watched_repos.clone(),
            clip_ids: sections.iter().map(|s| s.clip_id.clone()).collect(),
            sections,
            canonical_vod: None,
            md_path: format!(
                "content/blog/development/{}-{}.md",
                date.format("%Y-%m-%d"),
                post_kind.as_str()
            ),
            target_branch: "staging".to_string(),
            status: ManifestStatus::Draft,
            judge: None,
            draft: None,
            gen: None,
        };

        manifest.validate()?;
        info!(post_id = %manifest.post_id, sections = manifest.sections.len(), "Built manifest");
        Ok(manifest)
    }

    /// Fetch the correlation artifact referenced by a candidate, if any.
    async fn fetch_context(&self, candidate: &ScoredCandidate) -> Option<GitHubContext> {
        let clip_id = &candidate.item.clip_id;
        candidate.item.github_context_url.as_ref()?;
        let key = format!("github-context/{clip_id}.json");
        self.store.get_json::<GitHubContext>(&key).await.ok()
    }
}

/// Local day window `[00:00, 24:00)` converted to UTC.
pub fn day_window(date: NaiveDate, tz: Tz) -> PipelineResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_instant(date, NaiveTime::MIN, tz)?;
    let next_day = date
        .succ_opt()
        .ok_or_else(|| PipelineError::InvalidDate(date.to_string()))?;
    let end = local_instant(next_day, NaiveTime::MIN, tz)?;
    Ok((start, end))
}

/// Local noon converted to UTC; the manifest's nominal publication instant.
pub fn local_noon_utc(date: NaiveDate, tz: Tz) -> PipelineResult<DateTime<Utc>> {
    local_instant(
        date,
        NaiveTime::from_hms_opt(12, 0, 0).expect("noon is a valid time"),
        tz,
    )
}

fn local_instant(date: NaiveDate, time: NaiveTime, tz: Tz) -> PipelineResult<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| PipelineError::InvalidDate(format!("{date} {time} in {tz}")))
}

/// Assemble one section from a scored candidate.
fn build_section(
    index: usize,
    candidate: &ScoredCandidate,
    context: Option<&GitHubContext>,
    watched_repos: &[String],
) -> ManifestSection {
    let item = &candidate.item;

    let mut title = normalize_title(&item.clip_title, 80);
    if title.is_empty() {
        title = format!("Clip Highlight {}", index + 1);
    }

    let sentences: Vec<String> = item
        .transcript_summary
        .as_deref()
        .map(split_sentences)
        .unwrap_or_default();

    // Bullets: transcript sentences first, then GitHub activity, then
    // deterministic fallbacks to reach the schema minimum
    let mut bullets: Vec<String> = sentences
        .iter()
        .map(|s| clamp_with_ellipsis(&sanitize_text(s), MAX_BULLET_CHARS))
        .filter(|s| s.chars().count() >= MIN_BULLET_CHARS)
        .take(MAX_BULLETS - 1)
        .collect();

    if let Some(summary) = item.github_summary.as_deref() {
        if bullets.len() < MAX_BULLETS {
            bullets.push(clamp_with_ellipsis(
                &sanitize_text(&format!("Linked repository activity: {summary}")),
                MAX_BULLET_CHARS,
            ));
        }
    }
    while bullets.len() < 2 {
        let fallback = if bullets.is_empty() {
            format!("Clip runs {:.0} seconds from the day's stream", item.clip_duration)
        } else {
            "Watch the clip for the full walkthrough of this segment".to_string()
        };
        bullets.push(fallback);
    }

    // Paragraph: the first two meaningful sentences, plus a closing
    // repository reference when context exists
    let mut paragraph = sentences
        .iter()
        .filter(|s| s.chars().count() >= MIN_BULLET_CHARS)
        .take(2)
        .map(|s| sanitize_text(s))
        .collect::<Vec<_>>()
        .join(". ");
    if paragraph.is_empty() {
        paragraph = sanitize_text(&format!("A look at {} from today's stream.", title));
    } else {
        paragraph.push('.');
    }
    if let Some(ctx) = context {
        if !ctx.is_empty() {
            paragraph.push_str(&format!(
                " This segment lines up with {} on the repository side.",
                ctx.summary()
            ));
        }
    }

    let alignment_status = if item.transcript_url.is_some() {
        AlignmentStatus::Exact
    } else if item.clip_duration > 0.0 {
        AlignmentStatus::Estimated
    } else {
        AlignmentStatus::Missing
    };

    let has_context = context.map(|c| !c.is_empty()).unwrap_or(false);
    let pr_links: Option<Vec<String>> = context.and_then(|ctx| {
        if ctx.linked_prs.is_empty() {
            None
        } else {
            Some(ctx.linked_prs.iter().map(|pr| pr.url.clone()).collect())
        }
    });

    ManifestSection {
        section_id: format!("section-{}", index + 1),
        clip_id: item.clip_id.clone(),
        title,
        bullets,
        paragraph,
        score: candidate.score,
        repo: if has_context {
            watched_repos.first().cloned()
        } else {
            None
        },
        pr_links,
        clip_url: item.clip_url.clone(),
        alignment_status,
        start: 0.0,
        end: item.clip_duration,
        entities: candidate.entities.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone as _, Timelike};
    use recap_models::{ContentItem, ProcessingStatus, CONTENT_ITEM_SCHEMA_VERSION};

    fn candidate(clip_id: &str, summary: &str) -> ScoredCandidate {
        ScoredCandidate {
            item: ContentItem {
                schema_version: CONTENT_ITEM_SCHEMA_VERSION,
                clip_id: clip_id.to_string(),
                clip_title: "so let's debug the worker queue".to_string(),
                clip_url: format!("https://clips.twitch.tv/{clip_id}"),
                clip_duration: 45.0,
                clip_created_at: Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap(),
                clip_view_count: 20,
                processing_status: ProcessingStatus::ReadyForContent,
                transcript_url: Some("https://store/transcripts/x.json".to_string()),
                transcript_summary: Some(summary.to_string()),
                transcript_size_bytes: Some(900),
                github_context_url: None,
                github_summary: None,
                content_score: Some(0.7),
                content_category: None,
                stored_at: Utc::now(),
                enhanced_at: None,
                error: None,
            },
            score: 70,
            entities: vec!["worker".to_string(), "queue".to_string()],
        }
    }

    #[test]
    fn test_day_window_in_timezone() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let (start, end) = day_window(date, tz).unwrap();
        // EDT is UTC-4 in May
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 10, 4, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 5, 11, 4, 0, 0).unwrap());
    }

    #[test]
    fn test_local_noon_utc() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let noon = local_noon_utc(date, tz).unwrap();
        assert_eq!(noon.hour(), 16);
    }

    #[test]
    fn test_section_from_transcript() {
        let cand = candidate(
            "ClipA_01",
            "We chased the stuck consumer through the retry path. \
             The fix turned out to be a stale visibility timeout. Third sentence here too.",
        );
        let section = build_section(0, &cand, None, &[]);

        assert_eq!(section.section_id, "section-1");
        assert_eq!(section.title, "Debug The Worker Queue");
        assert!(section.bullets.len() >= 2 && section.bullets.len() <= 4);
        for bullet in &section.bullets {
            let n = bullet.chars().count();
            assert!((20..=140).contains(&n), "bullet length {n}");
        }
        assert!(section.paragraph.contains("stuck consumer"));
        assert_eq!(section.alignment_status, AlignmentStatus::Exact);
    }

    #[test]
    fn test_section_fallbacks_without_transcript() {
        let mut cand = candidate("ClipB_02", "");
        cand.item.transcript_summary = None;
        cand.item.transcript_url = None;
        let section = build_section(1, &cand, None, &[]);

        assert_eq!(section.bullets.len(), 2);
        assert_eq!(section.alignment_status, AlignmentStatus::Estimated);
        assert!(!section.paragraph.is_empty());
    }

    #[test]
    fn test_section_with_context_links() {
        use recap_models::{Confidence, LinkedActivity};
        let mut ctx = GitHubContext::empty("ClipA_01");
        ctx.linked_prs.push(LinkedActivity {
            title: "Fix visibility timeout".to_string(),
            url: "https://github.com/acme/app/pull/9".to_string(),
            timestamp: Utc::now(),
            confidence: Confidence::High,
            match_reason: "temporal_proximity".to_string(),
        });

        let cand = candidate(
            "ClipA_01",
            "We chased the stuck consumer through the retry path today.",
        );
        let section = build_section(0, &cand, Some(&ctx), &["acme/app".to_string()]);

        assert_eq!(section.repo.as_deref(), Some("acme/app"));
        assert_eq!(
            section.pr_links.as_deref(),
            Some(&["https://github.com/acme/app/pull/9".to_string()][..])
        );
        assert!(section.paragraph.contains("repository side"));
    }
}
