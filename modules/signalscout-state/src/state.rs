//! The pipeline state manager: per-profile stage tracking, the topic
//! registry, and the derived summary.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use signalscout_common::ScoutError;
use tracing::debug;

use crate::persist::{self, ProfileEntry, StateFile};
use crate::stage::Stage;

// ---------------------------------------------------------------------------
// Topic registry records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Pending,
    Completed,
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicStatus::Pending => f.write_str("pending"),
            TopicStatus::Completed => f.write_str("completed"),
        }
    }
}

/// One mining topic: its status and how many profiles it produced last run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub status: TopicStatus,
    #[serde(default)]
    pub results: u32,
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

impl TopicRecord {
    pub(crate) fn pending() -> Self {
        Self {
            status: TopicStatus::Pending,
            results: 0,
            last_run: None,
            added_at: Some(Utc::now()),
        }
    }

    /// Record shape for topics migrated from the legacy flat list: they had
    /// already been mined, but nothing else is known about them.
    pub(crate) fn legacy() -> Self {
        Self {
            status: TopicStatus::Completed,
            results: 0,
            last_run: None,
            added_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Derived snapshot of the pipeline, recomputed from the in-memory state on
/// every call so it can never drift from the authoritative store.
#[derive(Debug, Clone)]
pub struct StateSummary {
    pub total_profiles: usize,
    /// Per-stage completion counts, in pipeline order.
    pub stage_counts: Vec<(Stage, usize)>,
    pub topics_total: usize,
    pub topics_completed: usize,
    pub last_run: IndexMap<Stage, DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Tracks per-profile processing state across the six pipeline stages and
/// persists it to a JSON state file.
///
/// Handles are case-normalized to lowercase at this boundary. Lookups on
/// unknown handles return false/empty — "not yet processed" is the common
/// case, never an error. Mutations either save successfully or return
/// [`ScoutError::StateIo`] with the in-memory state intact, so a failed save
/// can simply be retried.
///
/// This is a single-operator tool: the backing file has no lock, and two
/// processes saving concurrently will clobber each other (last save wins).
pub struct PipelineState {
    path: PathBuf,
    state: StateFile,
}

impl PipelineState {
    /// Load state from `path`. A missing file means a cold start and a
    /// corrupt file is logged and discarded — construction never fails.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = persist::load_state(&path);
        debug!(
            path = %path.display(),
            profiles = state.profiles.len(),
            topics = state.pipeline.topics_mined.len(),
            "Pipeline state loaded"
        );
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the full state, overwriting the previous file.
    pub fn save(&self) -> Result<(), ScoutError> {
        persist::save_state(&self.path, &self.state)
    }

    // --- Per-profile state ---

    /// Ensure `handle` is tracked, with an empty stage set if new. In-memory
    /// only — callers batch registrations and save via a marking call or an
    /// explicit `save()`.
    pub fn register(&mut self, handle: &str) {
        self.state
            .profiles
            .entry(normalize(handle))
            .or_insert_with(ProfileEntry::default);
    }

    /// Mark one profile as processed at `stage` and save immediately.
    ///
    /// Convenience path: each call is a full disk write, so marking in a loop
    /// is O(n) saves — use [`mark_batch_processed`](Self::mark_batch_processed)
    /// for bulk transitions. This path deliberately does not move the
    /// pipeline `last_run` watermark; only batch completions do.
    pub fn mark_processed(&mut self, handle: &str, stage: Stage) -> Result<(), ScoutError> {
        self.state
            .profiles
            .entry(normalize(handle))
            .or_insert_with(ProfileEntry::default)
            .stages
            .insert(stage, Utc::now());
        self.save()
    }

    /// Mark many profiles as processed at `stage` with one shared timestamp
    /// and a single save, and advance the pipeline watermark for that stage.
    pub fn mark_batch_processed(
        &mut self,
        handles: &[String],
        stage: Stage,
    ) -> Result<(), ScoutError> {
        let now = Utc::now();
        for handle in handles {
            self.state
                .profiles
                .entry(normalize(handle))
                .or_insert_with(ProfileEntry::default)
                .stages
                .insert(stage, now);
        }
        self.state.pipeline.last_run.insert(stage, now);
        self.save()
    }

    /// Whether `handle` has completed `stage`. False for unknown handles.
    pub fn is_processed(&self, handle: &str, stage: Stage) -> bool {
        self.state
            .profiles
            .get(&normalize(handle))
            .map(|entry| entry.stages.contains_key(&stage))
            .unwrap_or(false)
    }

    /// Handles not yet processed at `stage`, in registration order.
    /// With `from_stage`, only handles that HAVE completed the prerequisite
    /// are considered. The prerequisite is caller-supplied, not enforced.
    pub fn unprocessed(&self, stage: Stage, from_stage: Option<Stage>) -> Vec<String> {
        self.state
            .profiles
            .iter()
            .filter(|(_, entry)| !entry.stages.contains_key(&stage))
            .filter(|(_, entry)| match from_stage {
                Some(prereq) => entry.stages.contains_key(&prereq),
                None => true,
            })
            .map(|(handle, _)| handle.clone())
            .collect()
    }

    /// Handles that have completed `stage`, in registration order.
    pub fn processed_at(&self, stage: Stage) -> Vec<String> {
        self.state
            .profiles
            .iter()
            .filter(|(_, entry)| entry.stages.contains_key(&stage))
            .map(|(handle, _)| handle.clone())
            .collect()
    }

    /// Every tracked handle, regardless of stage.
    pub fn all_handles(&self) -> HashSet<String> {
        self.state.profiles.keys().cloned().collect()
    }

    // --- Reset / repair ---

    /// Remove `stage` from every profile and clear its watermark, forcing a
    /// full re-run of that stage. Other stages are untouched.
    pub fn reset_stage(&mut self, stage: Stage) -> Result<(), ScoutError> {
        for entry in self.state.profiles.values_mut() {
            entry.stages.shift_remove(&stage);
        }
        self.state.pipeline.last_run.shift_remove(&stage);
        self.save()
    }

    /// Remove `stage` from a single profile. No-op for unknown handles.
    pub fn reset_profile_stage(&mut self, handle: &str, stage: Stage) -> Result<(), ScoutError> {
        if let Some(entry) = self.state.profiles.get_mut(&normalize(handle)) {
            entry.stages.shift_remove(&stage);
            self.save()?;
        }
        Ok(())
    }

    /// Remove a profile entirely — total removal, as opposed to the partial
    /// rollback of a stage reset.
    pub fn remove_profile(&mut self, handle: &str) -> Result<(), ScoutError> {
        self.state.profiles.shift_remove(&normalize(handle));
        self.save()
    }

    // --- Topics ---

    /// Record a new topic as pending. Re-adding an existing topic is a no-op
    /// (and does not save).
    pub fn add_topic(&mut self, name: &str) -> Result<(), ScoutError> {
        if self.state.pipeline.topics_mined.contains_key(name) {
            return Ok(());
        }
        self.state
            .pipeline
            .topics_mined
            .insert(name.to_string(), TopicRecord::pending());
        self.save()
    }

    /// Update a topic's mining status and result count. Self-healing: a
    /// missing topic is created first, so this never fails on unknown names.
    pub fn update_topic(
        &mut self,
        name: &str,
        status: TopicStatus,
        results: u32,
    ) -> Result<(), ScoutError> {
        let record = self
            .state
            .pipeline
            .topics_mined
            .entry(name.to_string())
            .or_insert_with(TopicRecord::pending);
        record.status = status;
        record.results = results;
        record.last_run = Some(Utc::now());
        self.save()
    }

    /// Delete a topic. No-op if absent.
    pub fn remove_topic(&mut self, name: &str) -> Result<(), ScoutError> {
        if self.state.pipeline.topics_mined.shift_remove(name).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Full topic snapshot, in registration order.
    pub fn topics(&self) -> &IndexMap<String, TopicRecord> {
        &self.state.pipeline.topics_mined
    }

    // --- Summary ---

    pub fn summary(&self) -> StateSummary {
        let stage_counts = Stage::ALL
            .iter()
            .map(|&stage| {
                let count = self
                    .state
                    .profiles
                    .values()
                    .filter(|entry| entry.stages.contains_key(&stage))
                    .count();
                (stage, count)
            })
            .collect();

        let topics = &self.state.pipeline.topics_mined;
        let topics_completed = topics
            .values()
            .filter(|t| t.status == TopicStatus::Completed)
            .count();

        StateSummary {
            total_profiles: self.state.profiles.len(),
            stage_counts,
            topics_total: topics.len(),
            topics_completed,
            last_run: self.state.pipeline.last_run.clone(),
        }
    }

    /// The batch-completion watermark for `stage`, if any batch has run.
    pub fn last_run(&self, stage: Stage) -> Option<DateTime<Utc>> {
        self.state.pipeline.last_run.get(&stage).copied()
    }
}

fn normalize(handle: &str) -> String {
    handle.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, PipelineState) {
        let dir = tempfile::tempdir().unwrap();
        let state = PipelineState::open(dir.path().join("state.json"));
        (dir, state)
    }

    #[test]
    fn cold_start_is_empty() {
        let (_dir, state) = open_temp();
        assert!(state.all_handles().is_empty());
        assert!(state.topics().is_empty());
    }

    #[test]
    fn register_is_idempotent() {
        let (_dir, mut state) = open_temp();
        state.register("Alice");
        state.register("alice");
        assert_eq!(state.all_handles().len(), 1);
        assert!(!state.is_processed("alice", Stage::Mined));
    }

    #[test]
    fn mark_is_monotonic_and_single_entry() {
        let (_dir, mut state) = open_temp();
        state.mark_processed("alice", Stage::Mined).unwrap();
        assert!(state.is_processed("alice", Stage::Mined));

        // Marking again updates the timestamp but never duplicates.
        state.mark_processed("alice", Stage::Mined).unwrap();
        assert!(state.is_processed("alice", Stage::Mined));
        assert_eq!(state.processed_at(Stage::Mined), vec!["alice"]);
    }

    #[test]
    fn unknown_handle_is_simply_unprocessed() {
        let (_dir, state) = open_temp();
        assert!(!state.is_processed("nobody", Stage::Exported));
    }

    #[test]
    fn unprocessed_honors_prerequisite_across_all_combinations() {
        let (_dir, mut state) = open_temp();
        // neither / prerequisite-only / stage-only / both
        state.register("neither");
        state.mark_processed("prereq_only", Stage::Mined).unwrap();
        state.mark_processed("stage_only", Stage::Enriched).unwrap();
        state.mark_processed("both", Stage::Mined).unwrap();
        state.mark_processed("both", Stage::Enriched).unwrap();

        let work = state.unprocessed(Stage::Enriched, Some(Stage::Mined));
        assert_eq!(work, vec!["prereq_only"]);

        // Without a prerequisite, everyone lacking the stage qualifies.
        let work = state.unprocessed(Stage::Enriched, None);
        assert_eq!(work, vec!["neither", "prereq_only"]);
    }

    #[test]
    fn example_scenario_alice_bob() {
        let (_dir, mut state) = open_temp();
        state.register("alice");
        state.register("bob");
        state.mark_processed("alice", Stage::Mined).unwrap();
        state.mark_processed("alice", Stage::Enriched).unwrap();
        state.mark_processed("bob", Stage::Mined).unwrap();

        assert_eq!(
            state.unprocessed(Stage::Enriched, Some(Stage::Mined)),
            vec!["bob"]
        );
        assert_eq!(state.processed_at(Stage::Mined), vec!["alice", "bob"]);
    }

    #[test]
    fn batch_mark_sets_watermark_single_mark_does_not() {
        let (_dir, mut state) = open_temp();
        state.mark_processed("alice", Stage::Mined).unwrap();
        assert!(state.last_run(Stage::Mined).is_none());

        state
            .mark_batch_processed(&["bob".to_string(), "carol".to_string()], Stage::Mined)
            .unwrap();
        assert!(state.last_run(Stage::Mined).is_some());
        assert_eq!(
            state.processed_at(Stage::Mined),
            vec!["alice", "bob", "carol"]
        );
    }

    #[test]
    fn reset_stage_clears_everyone_and_watermark_only_for_that_stage() {
        let (_dir, mut state) = open_temp();
        state
            .mark_batch_processed(&["alice".to_string(), "bob".to_string()], Stage::Mined)
            .unwrap();
        state
            .mark_batch_processed(&["alice".to_string()], Stage::Enriched)
            .unwrap();

        state.reset_stage(Stage::Mined).unwrap();
        assert!(!state.is_processed("alice", Stage::Mined));
        assert!(!state.is_processed("bob", Stage::Mined));
        assert!(state.last_run(Stage::Mined).is_none());

        // Other stages untouched.
        assert!(state.is_processed("alice", Stage::Enriched));
        assert!(state.last_run(Stage::Enriched).is_some());
    }

    #[test]
    fn reset_profile_stage_is_scoped() {
        let (_dir, mut state) = open_temp();
        state
            .mark_batch_processed(&["alice".to_string(), "bob".to_string()], Stage::Scored)
            .unwrap();
        state.reset_profile_stage("alice", Stage::Scored).unwrap();
        assert!(!state.is_processed("alice", Stage::Scored));
        assert!(state.is_processed("bob", Stage::Scored));
    }

    #[test]
    fn remove_profile_is_total() {
        let (_dir, mut state) = open_temp();
        state.mark_processed("alice", Stage::Mined).unwrap();
        state.remove_profile("alice").unwrap();
        assert!(state.all_handles().is_empty());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = PipelineState::open(&path);
        state.mark_processed("alice", Stage::Mined).unwrap();
        state.add_topic("ai agents").unwrap();
        drop(state);

        let reopened = PipelineState::open(&path);
        assert!(reopened.is_processed("alice", Stage::Mined));
        assert!(reopened.topics().contains_key("ai agents"));
    }

    #[test]
    fn add_topic_is_idempotent() {
        let (_dir, mut state) = open_temp();
        state.add_topic("ai agents").unwrap();
        state
            .update_topic("ai agents", TopicStatus::Completed, 7)
            .unwrap();
        // Re-adding must not reset the record.
        state.add_topic("ai agents").unwrap();

        let topic = &state.topics()["ai agents"];
        assert_eq!(topic.status, TopicStatus::Completed);
        assert_eq!(topic.results, 7);
    }

    #[test]
    fn update_topic_self_heals_missing_topics() {
        let (_dir, mut state) = open_temp();
        state
            .update_topic("never added", TopicStatus::Completed, 3)
            .unwrap();
        let topic = &state.topics()["never added"];
        assert_eq!(topic.status, TopicStatus::Completed);
        assert_eq!(topic.results, 3);
        assert!(topic.last_run.is_some());
    }

    #[test]
    fn remove_topic_is_noop_when_absent() {
        let (_dir, mut state) = open_temp();
        state.remove_topic("ghost").unwrap();
        assert!(state.topics().is_empty());
    }

    #[test]
    fn summary_recomputes_from_current_state() {
        let (_dir, mut state) = open_temp();
        state
            .mark_batch_processed(&["alice".to_string(), "bob".to_string()], Stage::Mined)
            .unwrap();
        state.mark_processed("alice", Stage::Enriched).unwrap();
        state.add_topic("pending one").unwrap();
        state
            .update_topic("done one", TopicStatus::Completed, 2)
            .unwrap();

        let summary = state.summary();
        assert_eq!(summary.total_profiles, 2);
        assert_eq!(summary.stage_counts[0], (Stage::Mined, 2));
        assert_eq!(summary.stage_counts[1], (Stage::Enriched, 1));
        assert_eq!(summary.topics_total, 2);
        assert_eq!(summary.topics_completed, 1);
        assert!(summary.last_run.contains_key(&Stage::Mined));

        // No caching: a reset is reflected immediately.
        state.reset_stage(Stage::Enriched).unwrap();
        assert_eq!(state.summary().stage_counts[1], (Stage::Enriched, 0));
    }
}
