//! Stage 5: classify scored profiles into persona categories.
//!
//! Two independent classifiers run per profile: a keyword-cluster semantic
//! classifier (always available) and an LLM classifier (degrades to the
//! noise category when no API key is configured). Both results are kept on
//! the profile so disagreements stay visible in the export.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use signalscout_common::{
    Classification, Config, Profile, CLASSIFICATION_CATEGORIES, NOISE_CATEGORY,
};
use signalscout_state::{PipelineState, Stage};
use tracing::info;

use crate::llm::strip_code_fences;
use crate::store::{load_profiles, save_profiles, upsert_by_handle};
use crate::traits::ChatModel;

// ---------------------------------------------------------------------------
// Keyword clusters
// ---------------------------------------------------------------------------

struct CategoryKeywords {
    category: &'static str,
    high: &'static [&'static str],
    medium: &'static [&'static str],
    low: &'static [&'static str],
}

const CATEGORY_KEYWORDS: &[CategoryKeywords] = &[
    CategoryKeywords {
        category: "Early-stage founder",
        high: &[
            "founder", "co-founder", "cofounder", "founding", "my startup",
            "we're building", "we are building", "launched", "pre-seed", "seed round",
        ],
        medium: &[
            "startup", "building", "shipping", "mvp", "early stage",
            "bootstrapped", "yc ", "y combinator", "stealth",
        ],
        low: &["product", "launch", "beta", "waitlist", "indie"],
    },
    CategoryKeywords {
        category: "AI researcher",
        high: &[
            "researcher", "phd", "research scientist", "paper", "arxiv",
            "publication", "professor", "postdoc",
        ],
        medium: &[
            "research", "university", "lab", "benchmark", "state of the art",
            "sota", "neurips", "icml", "iclr",
        ],
        low: &["experiment", "study", "academic", "thesis", "model training"],
    },
    CategoryKeywords {
        category: "AI operator",
        high: &[
            "ml engineer", "ai engineer", "machine learning engineer",
            "head of ai", "ai lead", "mlops",
        ],
        medium: &[
            "engineer", "deployed", "production", "infrastructure", "pipeline",
            "scaling", "inference",
        ],
        low: &["developer", "implementation", "api", "integration", "devops"],
    },
    CategoryKeywords {
        category: "Angel investor",
        high: &[
            "angel investor", "angel investing", "investor", "investing in",
            "backing founders", "portfolio",
        ],
        medium: &["investing", "venture", "vc", "fund", "checks", "lp"],
        low: &["advisor", "mentor", "board", "capital"],
    },
];

// ---------------------------------------------------------------------------
// Semantic classification
// ---------------------------------------------------------------------------

/// Score each category from keyword clusters (high 5, medium 2, low 0.5),
/// normalized to 0-100 of the cluster's maximum possible score. Returns the
/// per-category scores and the top category, or the noise category when
/// nothing matches.
pub fn classify_semantic(profile: &Profile) -> (HashMap<String, f64>, String) {
    let text = profile.full_text();
    let mut scores = HashMap::new();

    for cluster in CATEGORY_KEYWORDS {
        let high = cluster.high.iter().filter(|k| text.contains(*k)).count() as f64;
        let medium = cluster.medium.iter().filter(|k| text.contains(*k)).count() as f64;
        let low = cluster.low.iter().filter(|k| text.contains(*k)).count() as f64;

        let raw = high * 5.0 + medium * 2.0 + low * 0.5;
        let max = cluster.high.len() as f64 * 5.0
            + cluster.medium.len() as f64 * 2.0
            + cluster.low.len() as f64 * 0.5;
        let normalized = if max > 0.0 { (raw / max * 100.0).min(100.0) } else { 0.0 };
        scores.insert(cluster.category.to_string(), (normalized * 100.0).round() / 100.0);
    }

    let top = scores
        .iter()
        .filter(|(_, score)| **score > 0.0)
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(category, _)| category.clone())
        .unwrap_or_else(|| NOISE_CATEGORY.to_string());

    (scores, top)
}

// ---------------------------------------------------------------------------
// LLM classification
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LlmClassifyResponse {
    #[serde(default)]
    category: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

fn classify_prompt(profile: &Profile) -> String {
    let posts: String = profile
        .posts
        .iter()
        .take(8)
        .map(|p| {
            let text: String = p.text.chars().take(250).collect();
            format!("- {text}")
        })
        .collect::<Vec<_>>()
        .join("\n");
    let categories = CLASSIFICATION_CATEGORIES.join("\n- ");

    format!(
        "Classify this X/Twitter profile into exactly one category.\n\n\
         CATEGORIES:\n- {categories}\n\n\
         PROFILE:\n\
         - Handle: @{handle}\n\
         - Bio: {bio}\n\
         - Signal strength: {score}\n\n\
         RECENT POSTS:\n{posts}\n\n\
         RESPOND IN EXACTLY THIS JSON FORMAT:\n\
         {{\"category\": \"<one of the categories above, verbatim>\", \
         \"confidence\": <0.0-1.0>, \"reasoning\": \"<1-2 sentences>\"}}",
        handle = profile.handle,
        bio = profile.bio.as_deref().unwrap_or("N/A"),
        score = profile.signal_strength,
        posts = if posts.is_empty() { "None" } else { posts.as_str() },
    )
}

/// Match a raw LLM category string to a known category: exact first, then
/// case-insensitive, then substring either way. Anything else is noise.
fn validate_category(raw: &str) -> String {
    let trimmed = raw.trim();
    for known in CLASSIFICATION_CATEGORIES {
        if known == trimmed {
            return known.to_string();
        }
    }
    let lowered = trimmed.to_lowercase();
    for known in CLASSIFICATION_CATEGORIES {
        let known_lower = known.to_lowercase();
        if known_lower == lowered
            || known_lower.contains(&lowered)
            || lowered.contains(&known_lower)
        {
            return known.to_string();
        }
    }
    NOISE_CATEGORY.to_string()
}

/// LLM classification. Degrades to the noise category on any failure so the
/// batch keeps moving.
pub async fn classify_llm(
    chat: Option<&dyn ChatModel>,
    profile: &Profile,
) -> (String, f64, String) {
    let Some(chat) = chat else {
        return (
            NOISE_CATEGORY.to_string(),
            0.0,
            "LLM classification skipped: no API key".to_string(),
        );
    };

    let response = chat
        .complete(
            "You are an expert analyst classifying tech profiles. Output valid JSON only.",
            &classify_prompt(profile),
        )
        .await;

    match response {
        Ok(content) => {
            match serde_json::from_str::<LlmClassifyResponse>(strip_code_fences(&content)) {
                Ok(parsed) => (
                    validate_category(&parsed.category),
                    parsed.confidence.clamp(0.0, 1.0),
                    parsed.reasoning,
                ),
                Err(e) => (
                    NOISE_CATEGORY.to_string(),
                    0.0,
                    format!("LLM classification failed: {e}"),
                ),
            }
        }
        Err(e) => (
            NOISE_CATEGORY.to_string(),
            0.0,
            format!("LLM classification failed: {e}"),
        ),
    }
}

// ---------------------------------------------------------------------------
// Stage runner
// ---------------------------------------------------------------------------

/// Run both classifiers and attach the result to the profile.
pub async fn classify_profile(chat: Option<&dyn ChatModel>, profile: &mut Profile) {
    let (semantic_scores, semantic_top_category) = classify_semantic(profile);
    let (llm_category, llm_confidence, llm_reasoning) = classify_llm(chat, profile).await;

    profile.classification = Some(Classification {
        llm_category,
        llm_confidence,
        llm_reasoning,
        semantic_scores,
        semantic_top_category,
    });
    profile.classified_at = Some(Utc::now());
}

#[derive(Debug, Default)]
pub struct ClassifyOutcome {
    pub classified: usize,
    pub total_classified: usize,
}

/// Run the classification stage over scored profiles not yet classified.
pub async fn run_classify(
    state: &mut PipelineState,
    config: &Config,
    chat: Option<&dyn ChatModel>,
    limit: Option<usize>,
) -> Result<ClassifyOutcome> {
    let scored = load_profiles(&config.profiles_scored_file());
    let mut classified_set = load_profiles(&config.profiles_classified_file());

    let mut work: Vec<Profile> = scored
        .into_iter()
        .filter(|p| !state.is_processed(&p.handle, Stage::Classified))
        .collect();
    if let Some(limit) = limit {
        work.truncate(limit);
    }
    info!(profiles = work.len(), "Classification batch starting");

    let mut outcome = ClassifyOutcome::default();
    let pace = Duration::from_secs(config.llm_request_interval_secs);

    for (i, mut profile) in work.into_iter().enumerate() {
        if i > 0 && chat.is_some() && !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }

        classify_profile(chat, &mut profile).await;
        let classification = profile.classification.as_ref().unwrap();
        info!(
            handle = profile.handle.as_str(),
            llm = classification.llm_category.as_str(),
            semantic = classification.semantic_top_category.as_str(),
            "Profile classified"
        );

        let handle = profile.handle.clone();
        classified_set = upsert_by_handle(classified_set, vec![profile]);
        save_profiles(&config.profiles_classified_file(), &classified_set)?;
        state.mark_processed(&handle, Stage::Classified)?;
        outcome.classified += 1;
    }

    outcome.total_classified = classified_set.len();
    info!(
        classified = outcome.classified,
        total = outcome.total_classified,
        "Classification complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalscout_common::{Post, ScoutError};

    struct FixedChat(String);

    #[async_trait::async_trait]
    impl ChatModel for FixedChat {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String, ScoutError> {
            Ok(self.0.clone())
        }
    }

    fn profile_saying(bio: &str) -> Profile {
        let mut p = Profile::skeleton("tester", None);
        p.bio = Some(bio.to_string());
        p
    }

    #[test]
    fn founder_language_wins_the_semantic_vote() {
        let p = profile_saying("Co-founder, we're building an AI startup. Just launched our MVP.");
        let (scores, top) = classify_semantic(&p);
        assert_eq!(top, "Early-stage founder");
        assert!(scores["Early-stage founder"] > scores["AI researcher"]);
    }

    #[test]
    fn researcher_language_is_recognized() {
        let mut p = profile_saying("PhD researcher. Latest paper on arxiv.");
        p.posts = vec![Post {
            text: "our benchmark results at neurips".to_string(),
            ..Default::default()
        }];
        let (_, top) = classify_semantic(&p);
        assert_eq!(top, "AI researcher");
    }

    #[test]
    fn no_matches_fall_back_to_noise() {
        let p = profile_saying("I post about my cat.");
        let (_, top) = classify_semantic(&p);
        assert_eq!(top, NOISE_CATEGORY);
    }

    #[test]
    fn validates_llm_categories_loosely() {
        assert_eq!(validate_category("Early-stage founder"), "Early-stage founder");
        assert_eq!(validate_category("early-stage founder"), "Early-stage founder");
        assert_eq!(validate_category("AI Researcher"), "AI researcher");
        assert_eq!(validate_category("Angel"), "Angel investor");
        assert_eq!(validate_category("crypto influencer"), NOISE_CATEGORY);
        assert_eq!(validate_category(""), NOISE_CATEGORY);
    }

    #[tokio::test]
    async fn llm_classification_parses_fenced_json() {
        let chat = FixedChat(
            "```json\n{\"category\": \"AI operator\", \"confidence\": 0.8, \
             \"reasoning\": \"ships ML infra\"}\n```"
                .to_string(),
        );
        let p = profile_saying("ml engineer");
        let (category, confidence, reasoning) = classify_llm(Some(&chat), &p).await;
        assert_eq!(category, "AI operator");
        assert_eq!(confidence, 0.8);
        assert_eq!(reasoning, "ships ML infra");
    }

    #[tokio::test]
    async fn garbage_llm_output_degrades_to_noise() {
        let chat = FixedChat("not json at all".to_string());
        let p = profile_saying("founder");
        let (category, confidence, _) = classify_llm(Some(&chat), &p).await;
        assert_eq!(category, NOISE_CATEGORY);
        assert_eq!(confidence, 0.0);
    }

    #[tokio::test]
    async fn run_classify_marks_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_data_dir(dir.path());
        let mut state = PipelineState::open(config.state_file());

        let mut p = profile_saying("Co-founder building an AI startup");
        p.handle = "alice".to_string();
        crate::store::save_profiles(&config.profiles_scored_file(), &[p]).unwrap();
        state
            .mark_batch_processed(&["alice".to_string()], Stage::Scored)
            .unwrap();

        let outcome = run_classify(&mut state, &config, None, None).await.unwrap();
        assert_eq!(outcome.classified, 1);
        assert!(state.is_processed("alice", Stage::Classified));

        let classified = load_profiles(&config.profiles_classified_file());
        let classification = classified[0].classification.as_ref().unwrap();
        assert_eq!(classification.semantic_top_category, "Early-stage founder");
        assert_eq!(classification.llm_category, NOISE_CATEGORY);

        // Already classified, nothing left to do.
        let again = run_classify(&mut state, &config, None, None).await.unwrap();
        assert_eq!(again.classified, 0);
    }
}
