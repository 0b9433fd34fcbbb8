//! Stage 3: filter enriched profiles.
//!
//! Drops profiles that are too big (follower ceiling), gone quiet
//! (inactivity ceiling), or have no activity data at all. Dropped profiles
//! keep their reasons for the operator log.

use anyhow::Result;
use signalscout_common::{Config, Profile};
use signalscout_state::{PipelineState, Stage};
use tracing::info;

use crate::store::{load_profiles, save_profiles};

#[derive(Debug, Clone, Copy)]
pub struct FilterRules {
    /// Drop if followers_count >= this.
    pub max_followers: u64,
    /// Drop if days_since_active > this.
    pub max_inactive_days: i64,
}

impl From<&Config> for FilterRules {
    fn from(config: &Config) -> Self {
        Self {
            max_followers: config.max_followers,
            max_inactive_days: config.max_inactive_days,
        }
    }
}

#[derive(Debug)]
pub struct DroppedProfile {
    pub handle: String,
    pub reasons: Vec<String>,
}

#[derive(Debug)]
pub struct FilterOutcome {
    pub passed: Vec<Profile>,
    pub dropped: Vec<DroppedProfile>,
}

/// Apply the drop rules. Pure — no state or file access.
pub fn apply_filters(profiles: Vec<Profile>, rules: &FilterRules) -> FilterOutcome {
    let mut passed = Vec::new();
    let mut dropped = Vec::new();

    for profile in profiles {
        let mut reasons = Vec::new();

        if let Some(followers) = profile.followers_count {
            if followers >= rules.max_followers {
                reasons.push(format!(
                    "followers={followers} (max {})",
                    rules.max_followers
                ));
            }
        }

        match profile.days_since_active {
            Some(days) if days > rules.max_inactive_days => {
                reasons.push(format!(
                    "inactive {days}d (max {}d)",
                    rules.max_inactive_days
                ));
            }
            None if profile.posts.is_empty() => {
                reasons.push("no posts/activity data".to_string());
            }
            _ => {}
        }

        if reasons.is_empty() {
            passed.push(profile);
        } else {
            dropped.push(DroppedProfile {
                handle: profile.handle,
                reasons,
            });
        }
    }

    FilterOutcome { passed, dropped }
}

/// Run the filter stage over the enriched dataset.
pub fn run_filter(state: &mut PipelineState, config: &Config) -> Result<FilterOutcome> {
    let enriched = load_profiles(&config.profiles_enriched_file());
    let input = enriched.len();

    let outcome = apply_filters(enriched, &FilterRules::from(config));

    for drop in &outcome.dropped {
        info!(
            handle = drop.handle.as_str(),
            reasons = drop.reasons.join(", "),
            "Profile dropped"
        );
    }

    save_profiles(&config.profiles_filtered_file(), &outcome.passed)?;

    if !outcome.passed.is_empty() {
        let handles: Vec<String> = outcome.passed.iter().map(|p| p.handle.clone()).collect();
        state.mark_batch_processed(&handles, Stage::Filtered)?;
    }

    info!(
        input,
        passed = outcome.passed.len(),
        dropped = outcome.dropped.len(),
        "Filtering complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalscout_common::Post;

    const RULES: FilterRules = FilterRules {
        max_followers: 10_000,
        max_inactive_days: 25,
    };

    fn enriched(handle: &str, followers: u64, days_inactive: i64) -> Profile {
        let mut p = Profile::skeleton(handle, None);
        p.followers_count = Some(followers);
        p.days_since_active = Some(days_inactive);
        p.posts = vec![Post::default()];
        p
    }

    #[test]
    fn passes_active_small_accounts() {
        let outcome = apply_filters(vec![enriched("alice", 500, 3)], &RULES);
        assert_eq!(outcome.passed.len(), 1);
        assert!(outcome.dropped.is_empty());
    }

    #[test]
    fn drops_on_follower_ceiling() {
        let outcome = apply_filters(vec![enriched("big", 10_000, 3)], &RULES);
        assert_eq!(outcome.dropped.len(), 1);
        assert!(outcome.dropped[0].reasons[0].contains("followers=10000"));
    }

    #[test]
    fn drops_on_inactivity() {
        let outcome = apply_filters(vec![enriched("quiet", 500, 26)], &RULES);
        assert_eq!(outcome.dropped.len(), 1);
        assert!(outcome.dropped[0].reasons[0].contains("inactive 26d"));
    }

    #[test]
    fn drops_when_no_activity_data_at_all() {
        let bare = Profile::skeleton("ghost", None);
        let outcome = apply_filters(vec![bare], &RULES);
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].reasons[0], "no posts/activity data");
    }

    #[test]
    fn unknown_recency_with_posts_is_kept() {
        let mut p = Profile::skeleton("undated", None);
        p.posts = vec![Post::default()];
        let outcome = apply_filters(vec![p], &RULES);
        assert_eq!(outcome.passed.len(), 1);
    }

    #[test]
    fn collects_multiple_reasons() {
        let outcome = apply_filters(vec![enriched("bigquiet", 50_000, 90)], &RULES);
        assert_eq!(outcome.dropped[0].reasons.len(), 2);
    }

    #[test]
    fn filtering_nothing_leaves_the_watermark_alone() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_data_dir(dir.path());
        let mut state = PipelineState::open(config.state_file());

        save_profiles(
            &config.profiles_enriched_file(),
            &[enriched("big", 99_999, 1)],
        )
        .unwrap();

        let outcome = run_filter(&mut state, &config).unwrap();
        assert!(outcome.passed.is_empty());
        assert!(state.last_run(Stage::Filtered).is_none());
    }

    #[test]
    fn run_filter_marks_passed_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_data_dir(dir.path());
        let mut state = PipelineState::open(config.state_file());

        save_profiles(
            &config.profiles_enriched_file(),
            &[enriched("alice", 500, 3), enriched("big", 99_999, 1)],
        )
        .unwrap();

        let outcome = run_filter(&mut state, &config).unwrap();
        assert_eq!(outcome.passed.len(), 1);
        assert!(state.is_processed("alice", Stage::Filtered));
        assert!(!state.is_processed("big", Stage::Filtered));
        assert!(state.last_run(Stage::Filtered).is_some());
    }
}
