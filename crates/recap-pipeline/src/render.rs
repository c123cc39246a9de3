//! Manifest to Markdown rendering with YAML front-matter.

use serde::Serialize;
use sha2::{Digest, Sha256};
use url::Url;

use recap_models::{is_valid_clip_id, Manifest};

use crate::error::PipelineResult;

/// Hosts whose clip URLs may be embedded.
const TRUSTED_EMBED_HOSTS: [&str; 3] = ["clips.twitch.tv", "www.twitch.tv", "twitch.tv"];

/// Embed player parent domain.
const EMBED_PARENT: &str = "streamrecap.dev";

/// Front-matter serialized ahead of the body.
#[derive(Debug, Serialize)]
struct FrontMatter {
    title: String,
    date: String,
    description: String,
    category: String,
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    canonical: String,
    layout: String,
    published: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repos: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    social_headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    judge_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    judge_verdict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_generated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_generated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_prompt_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_content_hash: Option<String>,
}

/// Render a manifest into the final Markdown document.
///
/// The body is rendered first so the front-matter can carry its SHA-256
/// (`ai_content_hash`) when the draft is model-authored.
pub fn render_manifest(manifest: &Manifest) -> PipelineResult<String> {
    let body = render_body(manifest);

    let ai = manifest.gen.as_ref().filter(|_| manifest.draft.is_some());
    let front = FrontMatter {
        title: manifest.title.clone(),
        date: manifest.date_utc.to_rfc3339(),
        description: manifest.summary.clone(),
        category: manifest.category.clone(),
        tags: manifest.tags.clone(),
        image: None,
        canonical: format!("/blog/development/{}-{}", manifest.post_id, manifest.post_kind.as_str()),
        layout: "blog-post".to_string(),
        published: false,
        keywords: if manifest.tags.is_empty() {
            None
        } else {
            Some(manifest.tags.clone())
        },
        repos: if manifest.repos.is_empty() {
            None
        } else {
            Some(manifest.repos.clone())
        },
        social_headline: Some(manifest.headline_short.clone()),
        judge_score: manifest.judge.as_ref().map(|j| j.score),
        judge_verdict: manifest.judge.as_ref().map(|j| j.verdict.clone()),
        ai_generated: ai.map(|_| true),
        ai_model: ai.map(|gen| gen.model.clone()),
        ai_generated_at: ai.map(|gen| gen.generated_at.to_rfc3339()),
        ai_prompt_hash: ai.map(|gen| gen.prompt_hash.clone()),
        ai_content_hash: ai.map(|_| sha256_hex(body.as_bytes())),
    };

    let yaml = serde_yaml::to_string(&front)?;
    Ok(format!("---\n{yaml}---\n\n{body}"))
}

fn render_body(manifest: &Manifest) -> String {
    let mut md = String::new();
    let draft = manifest.draft.as_ref();

    md.push_str(&format!("# {}\n\n", manifest.title));

    // Intro: model-authored when available, standard otherwise
    let intro = draft
        .map(|d| d.intro.clone())
        .unwrap_or_else(|| {
            format!(
                "Another day on stream. Here is the recap for {}.",
                manifest.post_id
            )
        });
    md.push_str(&format!("{intro}\n\n"));

    let github_count = manifest
        .sections
        .iter()
        .filter(|s| s.repo.is_some() || s.pr_links.is_some())
        .count();
    md.push_str(&format!(
        "Today's recap covers {} clips, {} with linked GitHub activity.\n\n",
        manifest.sections.len(),
        github_count
    ));

    if manifest.sections.len() > 3 {
        md.push_str("## Contents\n\n");
        for (i, section) in manifest.sections.iter().enumerate() {
            md.push_str(&format!("- [{}](#section-{})\n", section.title, i + 1));
        }
        md.push('\n');
    }

    for (i, section) in manifest.sections.iter().enumerate() {
        md.push_str(&format!(
            "## {}. {} {{#section-{}}}\n\n",
            i + 1,
            section.title,
            i + 1
        ));

        if let Some(embed) = embed_block(&section.clip_url, &section.clip_id) {
            md.push_str(&embed);
            md.push('\n');
        }

        md.push_str("**Key Points**\n\n");
        for bullet in &section.bullets {
            md.push_str(&format!("- {bullet}\n"));
        }
        md.push('\n');

        let paragraph = draft
            .and_then(|d| d.section_paragraphs.get(i))
            .cloned()
            .unwrap_or_else(|| section.paragraph.clone());
        md.push_str(&format!("{paragraph}\n\n"));

        if let Some(links) = &section.pr_links {
            md.push_str("**Related GitHub Activity**\n\n");
            for link in links {
                md.push_str(&format!("- <{link}>\n"));
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
    }

    md.push_str(&format!("{}\n\n", manifest.summary));

    let outro = draft.map(|d| d.outro.as_str()).unwrap_or("");
    if !outro.is_empty() {
        md.push_str(&format!("{outro}\n\n"));
    }
    md.push_str(&format!(
        "*Recap assembled from {} clips on {}.*\n",
        manifest.clip_ids.len(),
        manifest.post_id
    ));

    md
}

/// Embed block for a clip, or `None` when the URL or id is untrusted.
///
/// Clip ids are re-validated and URL-encoded at the render boundary.
fn embed_block(clip_url: &str, clip_id: &str) -> Option<String> {
    if !is_valid_clip_id(clip_id) {
        return None;
    }
    let parsed = Url::parse(clip_url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    if !TRUSTED_EMBED_HOSTS.contains(&host.as_str()) {
        return None;
    }

    let encoded = urlencoding::encode(clip_id);
    Some(format!(
        "<div class=\"clip-embed\">\n  <iframe src=\"https://clips.twitch.tv/embed?clip={encoded}&parent={EMBED_PARENT}\" frameborder=\"0\" allowfullscreen=\"true\" height=\"378\" width=\"620\"></iframe>\n</div>\n"
    ))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recap_models::{
        AlignmentStatus, Draft, GenMeta, ManifestSection, ManifestStatus, PostKind,
        MANIFEST_SCHEMA_VERSION,
    };

    fn section(i: usize) -> ManifestSection {
        ManifestSection {
            section_id: format!("section-{i}"),
            clip_id: format!("Clip_{i:02}"),
            title: format!("Heading {i}"),
            bullets: vec![
                "First bullet with enough characters".to_string(),
                "Second bullet with enough characters".to_string(),
            ],
            paragraph: format!("Paragraph for section {i}."),
            score: 60,
            repo: Some("acme/app".to_string()),
            pr_links: Some(vec!["https://github.com/acme/app/pull/3".to_string()]),
            clip_url: format!("https://clips.twitch.tv/Clip_{i:02}"),
            alignment_status: AlignmentStatus::Exact,
            start: 0.0,
            end: 30.0,
            entities: vec![],
        }
    }

    fn manifest(with_draft: bool) -> Manifest {
        let sections: Vec<_> = (1..=6).map(section).collect();
        Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            post_id: "2024-05-10".to_string(),
            post_kind: PostKind::DailyRecap,
            date_utc: chrono::Utc.with_ymd_and_hms(2024, 5, 10, 16, 0, 0).unwrap(),
            tz: "America/New_York".to_string(),
            title: "Daily Dev Recap: 6 Clips with GitHub Context".to_string(),
            headline_short: "Daily Dev Recap: 6 Clips".to_string(),
            summary: "Six clips with context.".to_string(),
            category: "development".to_string(),
            tags: vec!["devlog".to_string()],
            repos: vec!["acme/app".to_string()],
            clip_ids: sections.iter().map(|s| s.clip_id.clone()).collect(),
            sections,
            canonical_vod: None,
            md_path: "content/blog/development/2024-05-10-daily-recap.md".to_string(),
            target_branch: "staging".to_string(),
            status: ManifestStatus::Draft,
            judge: None,
            draft: if with_draft {
                Some(Draft {
                    intro: "Model intro.".to_string(),
                    section_paragraphs: (1..=6).map(|i| format!("Model paragraph {i}.")).collect(),
                    outro: "Model outro.".to_string(),
                })
            } else {
                None
            },
            gen: if with_draft {
                Some(GenMeta {
                    model: "recap-drafter-large".to_string(),
                    temperature: 0.3,
                    top_p: 0.9,
                    seed: 42,
                    max_tokens: 2000,
                    prompt_hash: "p".repeat(64),
                    content_hash: "c".repeat(64),
                    generated_at: chrono::Utc.with_ymd_and_hms(2024, 5, 10, 17, 0, 0).unwrap(),
                })
            } else {
                None
            },
        }
    }

    #[test]
    fn test_front_matter_and_structure() {
        let md = render_manifest(&manifest(false)).unwrap();
        assert!(md.starts_with("---\n"));
        assert!(md.contains("published: false"));
        assert!(md.contains("# Daily Dev Recap: 6 Clips with GitHub Context"));
        assert!(md.contains("## Contents"));
        assert!(md.contains("## 1. Heading 1 {#section-1}"));
        assert!(md.contains("**Key Points**"));
        assert!(md.contains("**Related GitHub Activity**"));
        // Not AI-authored: no hashes in front-matter
        assert!(!md.contains("ai_generated"));
    }

    #[test]
    fn test_ai_front_matter_hashes_body() {
        let md = render_manifest(&manifest(true)).unwrap();
        assert!(md.contains("ai_generated: true"));
        assert!(md.contains("ai_model: recap-drafter-large"));
        assert!(md.contains("Model paragraph 3."));

        // The recorded hash matches the body that follows the front-matter
        let body = md.splitn(3, "---\n").nth(2).unwrap().trim_start_matches('\n');
        let hash_line = md
            .lines()
            .find(|l| l.starts_with("ai_content_hash:"))
            .unwrap();
        let recorded = hash_line.split_whitespace().nth(1).unwrap();
        assert_eq!(recorded, sha256_hex(body.as_bytes()));
    }

    #[test]
    fn test_embed_only_for_trusted_hosts() {
        assert!(embed_block("https://clips.twitch.tv/Abc_1", "Abc_1").is_some());
        assert!(embed_block("https://evil.example.com/Abc_1", "Abc_1").is_none());
        assert!(embed_block("https://clips.twitch.tv/x", "../escape").is_none());
        assert!(embed_block("not a url", "Abc_1").is_none());
    }

    #[test]
    fn test_clip_id_is_url_encoded_in_embed() {
        let embed = embed_block("https://clips.twitch.tv/A_b-1", "A_b-1").unwrap();
        assert!(embed.contains("clip=A_b-1"));
        assert!(embed.contains("parent=streamrecap.dev"));
    }
}
