//! Stage 6: export ranked results.
//!
//! Ranks by signal strength and writes two artifacts: a full JSON report
//! with per-component breakdowns and both classification verdicts, and a
//! flat CSV for spreadsheet triage. Falls back to the scored dataset when
//! classification has not run.

use anyhow::Result;
use serde::Serialize;
use signalscout_common::{Config, Profile, ScoutError, NOISE_CATEGORY};
use signalscout_state::{PipelineState, Stage};
use tracing::{info, warn};

use crate::store::load_profiles;

#[derive(Debug, Serialize)]
pub struct ResultRow {
    pub rank: usize,
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub profile_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    pub signal_strength: f64,
    pub llm_eval: f64,
    pub semantic: f64,
    pub technical: f64,
    pub tweet_engagement: f64,
    pub links: f64,
    pub profile_completeness: f64,
    pub llm_reasoning: String,
    pub category: String,
    pub category_confidence: f64,
    pub semantic_category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_topic: Option<String>,
    pub extracted_links: Vec<String>,
}

impl ResultRow {
    fn from_profile(rank: usize, profile: &Profile) -> Self {
        let breakdown = profile.score_breakdown.clone().unwrap_or_default();
        let (category, category_confidence, semantic_category) = match &profile.classification {
            Some(c) => (
                c.llm_category.clone(),
                c.llm_confidence,
                c.semantic_top_category.clone(),
            ),
            None => (NOISE_CATEGORY.to_string(), 0.0, NOISE_CATEGORY.to_string()),
        };

        Self {
            rank,
            handle: profile.handle.clone(),
            display_name: profile.display_name.clone(),
            profile_url: profile
                .profile_url
                .clone()
                .unwrap_or_else(|| format!("https://x.com/{}", profile.handle)),
            bio: profile.bio.clone(),
            followers_count: profile.followers_count,
            signal_strength: profile.signal_strength,
            llm_eval: breakdown.llm_eval,
            semantic: breakdown.semantic,
            technical: breakdown.technical,
            tweet_engagement: breakdown.tweet_engagement,
            links: breakdown.links,
            profile_completeness: breakdown.profile_completeness,
            llm_reasoning: breakdown.llm_reasoning,
            category,
            category_confidence,
            semantic_category,
            website: profile.website.clone(),
            source_topic: profile.source_topic.clone(),
            extracted_links: profile
                .extracted_links
                .iter()
                .map(|l| l.url.clone())
                .collect(),
        }
    }
}

/// Rank profiles by signal strength, descending. Ranks start at 1.
pub fn rank_profiles(mut profiles: Vec<Profile>) -> Vec<ResultRow> {
    profiles.sort_by(|a, b| {
        b.signal_strength
            .partial_cmp(&a.signal_strength)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    profiles
        .iter()
        .enumerate()
        .map(|(i, p)| ResultRow::from_profile(i + 1, p))
        .collect()
}

fn write_json(path: &std::path::Path, rows: &[ResultRow]) -> Result<(), ScoutError> {
    let json = serde_json::to_string_pretty(rows)
        .map_err(|e| ScoutError::Export(format!("results serialization: {e}")))?;
    std::fs::write(path, json).map_err(|e| ScoutError::Export(format!("{}: {e}", path.display())))
}

fn write_csv(path: &std::path::Path, rows: &[ResultRow]) -> Result<(), ScoutError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| ScoutError::Export(format!("{}: {e}", path.display())))?;

    writer
        .write_record([
            "rank",
            "handle",
            "display_name",
            "profile_url",
            "signal_strength",
            "llm_eval",
            "semantic",
            "technical",
            "tweet_engagement",
            "links",
            "profile_completeness",
            "category",
            "category_confidence",
            "semantic_category",
            "followers_count",
            "website",
            "source_topic",
        ])
        .map_err(|e| ScoutError::Export(e.to_string()))?;

    for row in rows {
        writer
            .write_record([
                row.rank.to_string(),
                row.handle.clone(),
                row.display_name.clone().unwrap_or_default(),
                row.profile_url.clone(),
                row.signal_strength.to_string(),
                row.llm_eval.to_string(),
                row.semantic.to_string(),
                row.technical.to_string(),
                row.tweet_engagement.to_string(),
                row.links.to_string(),
                row.profile_completeness.to_string(),
                row.category.clone(),
                row.category_confidence.to_string(),
                row.semantic_category.clone(),
                row.followers_count.map(|f| f.to_string()).unwrap_or_default(),
                row.website.clone().unwrap_or_default(),
                row.source_topic.clone().unwrap_or_default(),
            ])
            .map_err(|e| ScoutError::Export(e.to_string()))?;
    }
    writer.flush().map_err(|e| ScoutError::Export(e.to_string()))
}

#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub exported: usize,
}

/// Run the export stage: rank, write results.json and results.csv, and mark
/// everything exported in one batch.
pub fn run_export(state: &mut PipelineState, config: &Config) -> Result<ExportOutcome> {
    let mut profiles = load_profiles(&config.profiles_classified_file());
    if profiles.is_empty() {
        warn!("No classified profiles, falling back to scored dataset");
        profiles = load_profiles(&config.profiles_scored_file());
    }
    if profiles.is_empty() {
        info!("Nothing to export");
        return Ok(ExportOutcome::default());
    }

    let rows = rank_profiles(profiles);
    write_json(&config.results_json_file(), &rows)?;
    write_csv(&config.results_csv_file(), &rows)?;

    let handles: Vec<String> = rows.iter().map(|r| r.handle.clone()).collect();
    state.mark_batch_processed(&handles, Stage::Exported)?;

    info!(
        exported = rows.len(),
        json = %config.results_json_file().display(),
        csv = %config.results_csv_file().display(),
        "Export complete"
    );
    Ok(ExportOutcome {
        exported: rows.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::save_profiles;
    use signalscout_common::Classification;

    fn scored(handle: &str, strength: f64) -> Profile {
        let mut p = Profile::skeleton(handle, Some("agents"));
        p.signal_strength = strength;
        p.score_breakdown = Some(Default::default());
        p
    }

    #[test]
    fn ranking_is_descending_and_one_based() {
        let rows = rank_profiles(vec![
            scored("mid", 50.0),
            scored("top", 80.0),
            scored("low", 10.0),
        ]);
        assert_eq!(rows[0].handle, "top");
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[2].handle, "low");
        assert_eq!(rows[2].rank, 3);
    }

    #[test]
    fn unclassified_rows_export_as_noise() {
        let rows = rank_profiles(vec![scored("alice", 42.0)]);
        assert_eq!(rows[0].category, NOISE_CATEGORY);
        assert_eq!(rows[0].semantic_category, NOISE_CATEGORY);
    }

    #[test]
    fn run_export_writes_both_artifacts_and_marks() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_data_dir(dir.path());
        let mut state = PipelineState::open(config.state_file());

        let mut alice = scored("alice", 70.0);
        alice.classification = Some(Classification {
            llm_category: "Early-stage founder".to_string(),
            llm_confidence: 0.9,
            ..Default::default()
        });
        save_profiles(
            &config.profiles_classified_file(),
            &[alice, scored("bob", 30.0)],
        )
        .unwrap();

        let outcome = run_export(&mut state, &config).unwrap();
        assert_eq!(outcome.exported, 2);
        assert!(state.is_processed("alice", Stage::Exported));
        assert!(state.is_processed("bob", Stage::Exported));
        assert!(state.last_run(Stage::Exported).is_some());

        let json = std::fs::read_to_string(config.results_json_file()).unwrap();
        let rows: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(rows[0]["handle"], "alice");
        assert_eq!(rows[0]["category"], "Early-stage founder");

        let csv_text = std::fs::read_to_string(config.results_csv_file()).unwrap();
        let mut lines = csv_text.lines();
        assert!(lines.next().unwrap().starts_with("rank,handle"));
        assert!(lines.next().unwrap().starts_with("1,alice"));
    }

    #[test]
    fn export_falls_back_to_scored_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_data_dir(dir.path());
        let mut state = PipelineState::open(config.state_file());

        save_profiles(&config.profiles_scored_file(), &[scored("carol", 55.0)]).unwrap();

        let outcome = run_export(&mut state, &config).unwrap();
        assert_eq!(outcome.exported, 1);
        assert!(config.results_csv_file().exists());
    }

    #[test]
    fn empty_pipeline_exports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_data_dir(dir.path());
        let mut state = PipelineState::open(config.state_file());

        let outcome = run_export(&mut state, &config).unwrap();
        assert_eq!(outcome.exported, 0);
        assert!(!config.results_json_file().exists());
    }
}
