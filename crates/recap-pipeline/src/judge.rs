//! Deterministic editorial judgment over a built manifest.

use chrono::Utc;

use recap_models::{Manifest, ManifestJudge, MAX_SECTIONS};

/// Verdict threshold.
const PUBLISH_THRESHOLD: f64 = 0.5;

/// Score a manifest on section coverage, repository coverage, and bullet
/// density. The same manifest always judges identically (modulo the
/// timestamp), so the judgment never perturbs the draft hashes.
pub fn judge_manifest(manifest: &Manifest) -> ManifestJudge {
    let section_count = manifest.sections.len();

    let coverage = section_count as f64 / MAX_SECTIONS as f64;

    let github_share = if section_count > 0 {
        manifest
            .sections
            .iter()
            .filter(|s| s.repo.is_some() || s.pr_links.is_some())
            .count() as f64
            / section_count as f64
    } else {
        0.0
    };

    let bullet_density = if section_count > 0 {
        let total: usize = manifest.sections.iter().map(|s| s.bullets.len()).sum();
        (total as f64 / section_count as f64) / 4.0
    } else {
        0.0
    };

    let score = (coverage + github_share + bullet_density) / 3.0;
    let score = (score * 100.0).round() / 100.0;

    let mut notes = vec![format!("{} sections of a possible {}", section_count, MAX_SECTIONS)];
    if github_share == 0.0 {
        notes.push("no sections carry repository context".to_string());
    } else {
        notes.push(format!(
            "{:.0}% of sections carry repository context",
            github_share * 100.0
        ));
    }

    ManifestJudge {
        score,
        verdict: if score >= PUBLISH_THRESHOLD {
            "publish".to_string()
        } else {
            "review".to_string()
        },
        notes,
        judged_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use recap_models::{
        AlignmentStatus, ManifestSection, ManifestStatus, PostKind, MANIFEST_SCHEMA_VERSION,
    };

    fn manifest_with_sections(n: usize, with_repo: bool) -> Manifest {
        let sections: Vec<ManifestSection> = (1..=n)
            .map(|i| ManifestSection {
                section_id: format!("section-{i}"),
                clip_id: format!("Clip_{i:02}"),
                title: "Title".to_string(),
                bullets: vec![
                    "A first bullet with enough length".to_string(),
                    "A second bullet with enough length".to_string(),
                ],
                paragraph: "p".to_string(),
                score: 50,
                repo: if with_repo { Some("acme/app".to_string()) } else { None },
                pr_links: None,
                clip_url: "https://clips.twitch.tv/x".to_string(),
                alignment_status: AlignmentStatus::Estimated,
                start: 0.0,
                end: 10.0,
                entities: vec![],
            })
            .collect();

        Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            post_id: "2024-05-10".to_string(),
            post_kind: PostKind::DailyRecap,
            date_utc: chrono::Utc.with_ymd_and_hms(2024, 5, 10, 16, 0, 0).unwrap(),
            tz: "UTC".to_string(),
            title: "t".to_string(),
            headline_short: "h".to_string(),
            summary: "s".to_string(),
            category: "development".to_string(),
            tags: vec![],
            repos: vec![],
            clip_ids: vec![],
            sections,
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
    fn test_full_manifest_publishes() {
        let judge = judge_manifest(&manifest_with_sections(12, true));
        assert_eq!(judge.verdict, "publish");
        assert!(judge.score > 0.7);
    }

    #[test]
    fn test_sparse_manifest_needs_review() {
        let judge = judge_manifest(&manifest_with_sections(6, false));
        assert_eq!(judge.verdict, "review");
    }

    #[test]
    fn test_judgment_is_deterministic() {
        let m = manifest_with_sections(8, true);
        let a = judge_manifest(&m);
        let b = judge_manifest(&m);
        assert_eq!(a.score, b.score);
        assert_eq!(a.verdict, b.verdict);
        assert_eq!(a.notes, b.notes);
    }
}
