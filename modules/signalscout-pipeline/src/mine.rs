//! Stage 1: mine profiles from topics.
//!
//! Discovers handles via a `ProfileSource`, dedups against everything
//! already tracked, writes skeleton rows to the raw dataset, and marks the
//! batch as mined. Topic ideas can also be generated with the LLM and parked
//! in the topic registry as pending.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use signalscout_common::{Config, Profile, ScoutError};
use signalscout_state::{PipelineState, Stage, TopicStatus};
use tracing::info;

use crate::llm::strip_code_fences;
use crate::store::{load_profiles, save_profiles, upsert_by_handle};
use crate::traits::{ChatModel, ProfileSource};

static RE_PROFILE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:twitter\.com|x\.com)/([A-Za-z0-9_]{1,15})").unwrap()
});
static RE_HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{1,15}$").unwrap());

/// Normalize raw operator input to a bare lowercase handle: strips `@`,
/// pulls the handle out of pasted profile URLs, and rejects anything that
/// is not a valid handle.
pub fn clean_handle(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('@');
    let candidate = match RE_PROFILE_URL.captures(trimmed) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(trimmed),
        None => trimmed,
    };
    if RE_HANDLE.is_match(candidate) {
        Some(candidate.to_lowercase())
    } else {
        None
    }
}

/// Profile source fed directly by the operator: a list of raw handle
/// strings, cleaned and turned into skeleton profiles.
pub struct ManualSource {
    handles: Vec<String>,
}

impl ManualSource {
    pub fn new(handles: Vec<String>) -> Self {
        Self { handles }
    }
}

#[async_trait::async_trait]
impl ProfileSource for ManualSource {
    async fn discover(&self, topic: &str) -> Result<Vec<Profile>, ScoutError> {
        Ok(self
            .handles
            .iter()
            .filter_map(|raw| clean_handle(raw))
            .map(|handle| Profile::skeleton(&handle, Some(topic)))
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MineOutcome {
    pub added: usize,
    pub skipped: usize,
}

/// Run the mining stage for the given topics.
pub async fn run_mine(
    state: &mut PipelineState,
    config: &Config,
    source: &dyn ProfileSource,
    topics: &[String],
) -> Result<MineOutcome> {
    let raw_path = config.profiles_raw_file();
    let existing = load_profiles(&raw_path);

    let mut known = state.all_handles();
    for profile in &existing {
        known.insert(profile.handle.clone());
    }

    let mut outcome = MineOutcome::default();
    let mut new_profiles: Vec<Profile> = Vec::new();

    for topic in topics {
        state.add_topic(topic)?;

        let discovered = source.discover(topic).await?;
        let mut topic_count = 0u32;

        for profile in discovered {
            if known.contains(&profile.handle) {
                outcome.skipped += 1;
                continue;
            }
            known.insert(profile.handle.clone());
            state.register(&profile.handle);
            new_profiles.push(profile);
            topic_count += 1;
        }

        state.update_topic(topic, TopicStatus::Completed, topic_count)?;
        info!(topic = topic.as_str(), found = topic_count, "Topic mined");
    }

    if !new_profiles.is_empty() {
        let handles: Vec<String> = new_profiles.iter().map(|p| p.handle.clone()).collect();
        outcome.added = handles.len();
        save_profiles(&raw_path, &upsert_by_handle(existing, new_profiles))?;
        state.mark_batch_processed(&handles, Stage::Mined)?;
    }

    info!(
        added = outcome.added,
        skipped = outcome.skipped,
        "Mining complete"
    );
    Ok(outcome)
}

/// Generate topic ideas with the LLM and park them as pending topics.
pub async fn generate_topics(chat: &dyn ChatModel, count: usize) -> Result<Vec<String>, ScoutError> {
    let prompt = format!(
        "Generate exactly {count} short descriptions of early-stage AI builders on X/Twitter to look for.\n\
         These should define specific technical personas.\n\n\
         Focus on builders who:\n\
         - Ship code and products (not just commentators)\n\
         - Work on AI agents, LLM tools, fine-tuning, indie hackers\n\
         - Share technical progress publicly\n\n\
         Return ONLY a JSON array of strings. No other text.\n\
         Example: [\"indie AI agent builder\", \"LLM infra startup founder\"]"
    );

    let response = chat
        .complete(
            "You generate target personas for research. Output only JSON arrays.",
            &prompt,
        )
        .await?;

    let topics: Vec<String> = serde_json::from_str(strip_code_fences(&response))
        .map_err(|e| ScoutError::Llm(format!("expected a JSON array of topics: {e}")))?;
    Ok(topics)
}
