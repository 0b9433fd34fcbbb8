//! Stage 4: six-component signal-strength scoring.
//!
//! Components and maxima: LLM eval 35, semantic relevance 20, technical
//! density 15, tweet engagement 15, links 10, profile completeness 5 — a
//! 0-100 total. All components except the LLM eval are pure functions over
//! the enriched profile.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use serde::Deserialize;
use signalscout_common::{
    Config, EngagementDetails, ExtractedLink, Profile, ScoreBreakdown,
};
use signalscout_state::{PipelineState, Stage};
use tracing::info;

use crate::llm::strip_code_fences;
use crate::store::{load_profiles, save_profiles, upsert_by_handle};
use crate::traits::ChatModel;

// ---------------------------------------------------------------------------
// Technical keyword tiers
// ---------------------------------------------------------------------------

const TIER1_KEYWORDS: &[&str] = &[
    "llm", "gpt", "transformer", "fine-tune", "fine-tuning",
    "rag", "vector database", "embedding", "langchain", "llamaindex",
    "diffusion", "stable diffusion", "midjourney", "comfyui",
    "pytorch", "tensorflow", "hugging face", "huggingface",
    "ai agent", "ai agents", "autonomous agent", "multi-agent",
    "neural network", "deep learning", "machine learning",
    "openai", "anthropic", "claude", "gemini", "mistral", "llama",
];

const TIER2_KEYWORDS: &[&str] = &[
    "api", "deployment", "inference", "gpu", "cuda",
    "docker", "kubernetes", "mlops", "model serving",
    "prompt engineering", "chain of thought", "few-shot",
    "retrieval", "knowledge graph", "chatbot",
    "nlp", "computer vision", "speech", "multimodal",
    "open source", "github", "npm", "pip install",
];

const TIER3_KEYWORDS: &[&str] = &[
    "python", "javascript", "typescript", "rust", "golang",
    "startup", "founder", "building", "shipped", "launched",
    "product", "saas", "platform", "tool", "framework",
    "data", "analytics", "pipeline", "automation",
];

const AI_CONCEPTS: &[&str] = &[
    "artificial intelligence", "machine learning", "deep learning",
    "ai agent", "llm", "large language model", "foundation model",
    "neural network", "natural language processing", "computer vision",
    "generative ai", "gen ai", "ai startup", "ai tool", "ai infrastructure",
    "ai product", "ai platform", "ai framework", "ai research",
    "ml model", "ml pipeline", "ml ops", "model training", "model deployment",
    "fine-tuning", "prompt engineering", "rag", "retrieval augmented",
    "vector database", "semantic search", "embedding", "transformer",
    "diffusion model", "image generation", "text generation", "code generation",
];

const BUILDER_CONCEPTS: &[&str] = &[
    "building", "shipping", "launched", "deployed", "open source",
    "founder", "startup", "indie hacker", "solo dev", "co-founder",
    "seed", "pre-seed", "mvp", "prototype", "beta", "alpha",
    "built", "created", "developed", "released", "published",
];

// ---------------------------------------------------------------------------
// Pure components
// ---------------------------------------------------------------------------

/// Technical density (0-15): tiered keyword matching over bio + posts.
/// Tier 1 scores 3 each (cap 9), tier 2 scores 1.5 (cap 4.5), tier 3
/// scores 0.5 (cap 1.5).
pub fn score_technical_density(profile: &Profile) -> (f64, Vec<String>) {
    let text = profile.full_text();
    let mut found = Vec::new();
    let mut score = 0.0;

    let tiers: [(&[&str], f64, f64); 3] = [
        (TIER1_KEYWORDS, 3.0, 9.0),
        (TIER2_KEYWORDS, 1.5, 4.5),
        (TIER3_KEYWORDS, 0.5, 1.5),
    ];
    for (keywords, points, cap) in tiers {
        let mut count = 0u32;
        for kw in keywords {
            if text.contains(kw) {
                found.push(kw.to_string());
                count += 1;
            }
        }
        score += (f64::from(count) * points).min(cap);
    }

    (score.min(15.0), found)
}

/// Link analysis (0-10): GitHub 4, personal website 2, Product Hunt 2,
/// other platforms 0.5 each capped at 2.
pub fn score_links(profile: &Profile) -> (f64, Vec<ExtractedLink>) {
    let mut platforms: Vec<&str> = profile
        .extracted_links
        .iter()
        .map(|l| l.platform.as_str())
        .collect();
    platforms.sort_unstable();
    platforms.dedup();

    let mut score = 0.0;
    if platforms.contains(&"github") {
        score += 4.0;
    }
    if platforms.contains(&"website") || profile.website.is_some() {
        score += 2.0;
    }
    if platforms.contains(&"product_hunt") {
        score += 2.0;
    }
    let other = platforms
        .iter()
        .filter(|p| !matches!(**p, "github" | "website" | "product_hunt"))
        .count();
    score += (other as f64 * 0.5).min(2.0);

    (score.min(10.0), profile.extracted_links.clone())
}

/// Tweet engagement (0-15): banded average likes, retweets, engagement
/// rate, and post-frequency bonus.
pub fn score_tweet_engagement(profile: &Profile) -> f64 {
    let posts = &profile.posts;
    if posts.is_empty() {
        return 0.0;
    }
    let n = posts.len() as f64;
    let total_likes: u64 = posts.iter().map(|p| p.like_count).sum();
    let total_retweets: u64 = posts.iter().map(|p| p.retweet_count).sum();
    let total_views: u64 = posts.iter().map(|p| p.view_count).sum();

    let avg_likes = total_likes as f64 / n;
    let avg_retweets = total_retweets as f64 / n;

    let mut score: f64 = 0.0;
    score += match avg_likes {
        l if l >= 50.0 => 5.0,
        l if l >= 20.0 => 3.5,
        l if l >= 5.0 => 2.0,
        l if l >= 1.0 => 1.0,
        _ => 0.0,
    };
    score += match avg_retweets {
        r if r >= 20.0 => 4.0,
        r if r >= 5.0 => 2.5,
        r if r >= 1.0 => 1.5,
        _ => 0.0,
    };
    if total_views > 0 {
        let rate = (total_likes + total_retweets) as f64 / total_views as f64;
        score += match rate {
            r if r > 0.05 => 4.0,
            r if r > 0.02 => 3.0,
            r if r > 0.01 => 2.0,
            r if r > 0.005 => 1.0,
            _ => 0.0,
        };
    }
    score += match posts.len() {
        len if len >= 8 => 2.0,
        len if len >= 5 => 1.0,
        _ => 0.0,
    };

    score.min(15.0)
}

/// Profile completeness (0-5).
pub fn score_profile_completeness(profile: &Profile) -> f64 {
    let mut score: f64 = 0.0;
    match &profile.bio {
        Some(bio) if bio.len() > 20 => score += 1.5,
        Some(_) => score += 0.5,
        None => {}
    }
    if profile.website.is_some() {
        score += 1.0;
    }
    if profile.location.is_some() {
        score += 0.5;
    }
    if profile.display_name.is_some() {
        score += 0.5;
    }
    if profile.profile_image_url.is_some() {
        score += 0.5;
    }
    if profile.posts.len() >= 5 {
        score += 1.0;
    }
    score.min(5.0)
}

/// Semantic relevance (0-20): AI concepts weighted 2.0 (cap 12), builder
/// concepts 1.5 (cap 8).
pub fn score_semantic_relevance(profile: &Profile) -> f64 {
    let text = profile.full_text();
    if text.trim().is_empty() {
        return 0.0;
    }

    let ai_matches = AI_CONCEPTS.iter().filter(|c| text.contains(*c)).count();
    let builder_matches = BUILDER_CONCEPTS.iter().filter(|c| text.contains(*c)).count();

    let ai_normalized = (ai_matches as f64 * 2.0).min(12.0);
    let builder_normalized = (builder_matches as f64 * 1.5).min(8.0);
    (ai_normalized + builder_normalized).min(20.0)
}

// ---------------------------------------------------------------------------
// LLM eval
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LlmEval {
    pub score: f64,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct LlmEvalResponse {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    reasoning: String,
}

fn eval_prompt(profile: &Profile) -> String {
    let mut posts_text = String::new();
    for (i, post) in profile.posts.iter().take(10).enumerate() {
        let text: String = post.text.chars().take(300).collect();
        posts_text.push_str(&format!(
            "\n  Post {}: {}\n    [likes={}, retweets={}, views={}]\n",
            i + 1,
            text,
            post.like_count,
            post.retweet_count,
            post.view_count
        ));
    }
    let links_text = if profile.extracted_links.is_empty() {
        "None found".to_string()
    } else {
        profile
            .extracted_links
            .iter()
            .map(|l| format!("  - {}: {}", l.platform, l.url))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You are an expert analyst identifying early-stage AI builders and founders.\n\n\
         Evaluate this X/Twitter profile for their potential as an early-stage AI builder, researcher, or operator.\n\n\
         PROFILE:\n\
         - Handle: @{handle}\n\
         - Bio: {bio}\n\
         - Followers: {followers}\n\
         - Following: {following}\n\
         - Website: {website}\n\
         - Location: {location}\n\
         - Last Active: {days_inactive} days ago\n\
         - Shipping Signals: {shipping}\n\n\
         EXTRACTED LINKS:\n{links_text}\n\n\
         RECENT POSTS (up to 10):\n{posts}\n\n\
         SCORING CRITERIA (0-35 points):\n\
         Score based on evidence of:\n\
         1. Actively building or shipping AI/ML products or tools (0-10)\n\
         2. Technical depth in AI/ML (specific models, frameworks, architectures) (0-8)\n\
         3. Entrepreneurial signals (founding, launching, user engagement) (0-7)\n\
         4. Community contribution (open source, tutorials, demos) (0-5)\n\
         5. Recency and consistency of activity (0-5)\n\n\
         RESPOND IN EXACTLY THIS JSON FORMAT:\n\
         {{\"score\": <0-35>, \"reasoning\": \"<2-3 sentence justification>\"}}\n\n\
         Be strict. Only high-quality, actively building profiles should score above 20.",
        handle = profile.handle,
        bio = profile.bio.as_deref().unwrap_or("N/A"),
        followers = opt_num(profile.followers_count),
        following = opt_num(profile.following_count),
        website = profile.website.as_deref().unwrap_or("N/A"),
        location = profile.location.as_deref().unwrap_or("N/A"),
        days_inactive = profile
            .days_since_active
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string()),
        shipping = if profile.shipping_keywords.is_empty() {
            "None".to_string()
        } else {
            profile.shipping_keywords.join(", ")
        },
        posts = if posts_text.trim().is_empty() {
            "No posts available"
        } else {
            posts_text.as_str()
        },
    )
}

fn opt_num(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

/// LLM eval (0-35). Degrades to zero with the failure in the reasoning so a
/// missing key or a flaky API never aborts the batch.
pub async fn score_llm_eval(chat: Option<&dyn ChatModel>, profile: &Profile) -> LlmEval {
    let Some(chat) = chat else {
        return LlmEval {
            score: 0.0,
            reasoning: "LLM evaluation skipped: no API key".to_string(),
        };
    };

    let response = chat
        .complete(
            "You are an expert tech talent scout. Output valid JSON only.",
            &eval_prompt(profile),
        )
        .await;

    match response {
        Ok(content) => match serde_json::from_str::<LlmEvalResponse>(strip_code_fences(&content)) {
            Ok(parsed) => LlmEval {
                score: parsed.score.clamp(0.0, 35.0),
                reasoning: if parsed.reasoning.is_empty() {
                    "No reasoning provided".to_string()
                } else {
                    parsed.reasoning
                },
            },
            Err(e) => LlmEval {
                score: 0.0,
                reasoning: format!("LLM evaluation failed: {e}"),
            },
        },
        Err(e) => LlmEval {
            score: 0.0,
            reasoning: format!("LLM evaluation failed: {e}"),
        },
    }
}

// ---------------------------------------------------------------------------
// Assembly + stage runner
// ---------------------------------------------------------------------------

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute all components and attach the breakdown and total to the profile.
pub fn apply_score(profile: &mut Profile, llm: LlmEval) {
    let (technical, technical_keywords) = score_technical_density(profile);
    let (links, link_details) = score_links(profile);
    let engagement = score_tweet_engagement(profile);
    let completeness = score_profile_completeness(profile);
    let semantic = score_semantic_relevance(profile);

    let n = profile.posts.len().max(1) as f64;
    let avg_likes = profile.posts.iter().map(|p| p.like_count).sum::<u64>() as f64 / n;
    let avg_retweets = profile.posts.iter().map(|p| p.retweet_count).sum::<u64>() as f64 / n;

    profile.signal_strength =
        round2(llm.score + semantic + technical + engagement + links + completeness);
    profile.score_breakdown = Some(ScoreBreakdown {
        llm_eval: round2(llm.score),
        llm_reasoning: llm.reasoning,
        semantic: round2(semantic),
        technical: round2(technical),
        technical_keywords: technical_keywords.into_iter().take(15).collect(),
        tweet_engagement: round2(engagement),
        engagement_details: EngagementDetails {
            avg_likes: (avg_likes * 10.0).round() / 10.0,
            avg_retweets: (avg_retweets * 10.0).round() / 10.0,
        },
        links: round2(links),
        link_details,
        profile_completeness: round2(completeness),
    });
    profile.scored_at = Some(Utc::now());
}

#[derive(Debug, Default)]
pub struct ScoreOutcome {
    pub scored: usize,
    pub total_scored: usize,
}

/// Run the scoring stage over filtered profiles not yet scored. Profiles are
/// marked one at a time so an interrupted run resumes cleanly.
pub async fn run_score(
    state: &mut PipelineState,
    config: &Config,
    chat: Option<&dyn ChatModel>,
    limit: Option<usize>,
) -> Result<ScoreOutcome> {
    let filtered = load_profiles(&config.profiles_filtered_file());
    let mut scored_set = load_profiles(&config.profiles_scored_file());

    let mut work: Vec<Profile> = filtered
        .into_iter()
        .filter(|p| !state.is_processed(&p.handle, Stage::Scored))
        .collect();
    if let Some(limit) = limit {
        work.truncate(limit);
    }
    info!(profiles = work.len(), "Scoring batch starting");

    let mut outcome = ScoreOutcome::default();
    let pace = Duration::from_secs(config.llm_request_interval_secs);

    for (i, mut profile) in work.into_iter().enumerate() {
        if i > 0 && chat.is_some() && !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }

        let llm = score_llm_eval(chat, &profile).await;
        apply_score(&mut profile, llm);
        info!(
            handle = profile.handle.as_str(),
            score = profile.signal_strength,
            "Profile scored"
        );

        let handle = profile.handle.clone();
        scored_set = upsert_by_handle(scored_set, vec![profile]);
        scored_set.sort_by(|a, b| {
            b.signal_strength
                .partial_cmp(&a.signal_strength)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        save_profiles(&config.profiles_scored_file(), &scored_set)?;
        state.mark_processed(&handle, Stage::Scored)?;
        outcome.scored += 1;
    }

    outcome.total_scored = scored_set.len();
    info!(
        scored = outcome.scored,
        total = outcome.total_scored,
        "Scoring complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use signalscout_common::Post;

    fn profile_with_text(bio: &str, posts: &[&str]) -> Profile {
        let mut p = Profile::skeleton("tester", None);
        p.bio = Some(bio.to_string());
        p.posts = posts
            .iter()
            .map(|text| Post {
                text: text.to_string(),
                ..Default::default()
            })
            .collect();
        p
    }

    #[test]
    fn technical_density_caps_per_tier() {
        let p = profile_with_text(
            "llm gpt transformer rag embedding pytorch api docker github python rust startup",
            &[],
        );
        let (score, keywords) = score_technical_density(&p);
        // Tier 1 saturates at 9 even with 6 matches.
        assert!(score <= 15.0);
        assert!(score >= 9.0);
        assert!(keywords.contains(&"llm".to_string()));
    }

    #[test]
    fn empty_profile_scores_zero_everywhere() {
        let p = Profile::skeleton("empty", None);
        assert_eq!(score_technical_density(&p).0, 0.0);
        assert_eq!(score_links(&p).0, 0.0);
        assert_eq!(score_tweet_engagement(&p), 0.0);
        assert_eq!(score_semantic_relevance(&p), 0.0);
    }

    #[test]
    fn links_score_rewards_github_most() {
        let mut p = Profile::skeleton("linked", None);
        p.extracted_links = vec![
            ExtractedLink {
                platform: "github".to_string(),
                url: "https://github.com/a/b".to_string(),
                source: "post".to_string(),
            },
            ExtractedLink {
                platform: "huggingface".to_string(),
                url: "https://huggingface.co/a".to_string(),
                source: "post".to_string(),
            },
        ];
        p.website = Some("https://a.dev".to_string());
        let (score, _) = score_links(&p);
        // github 4 + website 2 + one other 0.5
        assert_eq!(score, 6.5);
    }

    #[test]
    fn engagement_bands_add_up() {
        let mut p = Profile::skeleton("popular", None);
        p.posts = (0..8)
            .map(|_| Post {
                like_count: 60,
                retweet_count: 25,
                view_count: 1000,
                ..Default::default()
            })
            .collect();
        // likes 5 + retweets 4 + rate (85/1000 > 0.05) 4 + frequency 2 = 15
        assert_eq!(score_tweet_engagement(&p), 15.0);
    }

    #[test]
    fn completeness_counts_filled_fields() {
        let mut p = Profile::skeleton("full", None);
        p.bio = Some("a bio much longer than twenty characters".to_string());
        p.website = Some("https://a.dev".to_string());
        p.location = Some("Berlin".to_string());
        p.display_name = Some("A".to_string());
        p.profile_image_url = Some("https://img".to_string());
        p.posts = vec![Post::default(); 5];
        assert_eq!(score_profile_completeness(&p), 5.0);
    }

    #[test]
    fn semantic_relevance_weights_ai_over_builder() {
        let p = profile_with_text("machine learning llm ai agent", &["building and shipping"]);
        let score = score_semantic_relevance(&p);
        assert!(score > 0.0);
        assert!(score <= 20.0);
    }

    #[tokio::test]
    async fn llm_eval_degrades_without_a_key() {
        let p = Profile::skeleton("nobody", None);
        let eval = score_llm_eval(None, &p).await;
        assert_eq!(eval.score, 0.0);
        assert!(eval.reasoning.contains("skipped"));
    }

    #[tokio::test]
    async fn apply_score_totals_and_rounds() {
        let mut p = profile_with_text(
            "Building LLM agents. github.com/x/y",
            &["just shipped the mvp", "open source rag pipeline"],
        );
        let llm = LlmEval {
            score: 21.0,
            reasoning: "solid builder".to_string(),
        };
        apply_score(&mut p, llm);

        let breakdown = p.score_breakdown.as_ref().unwrap();
        let sum = breakdown.llm_eval
            + breakdown.semantic
            + breakdown.technical
            + breakdown.tweet_engagement
            + breakdown.links
            + breakdown.profile_completeness;
        assert!((p.signal_strength - round2(sum)).abs() < 1e-9);
        assert!(p.scored_at.is_some());
    }

    #[tokio::test]
    async fn run_score_resumes_and_sorts_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::at_data_dir(dir.path());
        let mut state = PipelineState::open(config.state_file());

        let mut strong = profile_with_text(
            "Founder building LLM agents. github.com/s/agent",
            &["shipped v1", "open source"],
        );
        strong.handle = "strong".to_string();
        let mut weak = Profile::skeleton("weak", None);
        weak.posts = vec![Post::default()];

        crate::store::save_profiles(
            &config.profiles_filtered_file(),
            &[weak.clone(), strong.clone()],
        )
        .unwrap();
        state
            .mark_batch_processed(
                &["weak".to_string(), "strong".to_string()],
                Stage::Filtered,
            )
            .unwrap();

        let outcome = run_score(&mut state, &config, None, None).await.unwrap();
        assert_eq!(outcome.scored, 2);
        assert!(state.is_processed("weak", Stage::Scored));
        assert!(state.is_processed("strong", Stage::Scored));

        let scored = load_profiles(&config.profiles_scored_file());
        assert_eq!(scored[0].handle, "strong");

        // Re-run: everything already marked, nothing to score.
        let again = run_score(&mut state, &config, None, None).await.unwrap();
        assert_eq!(again.scored, 0);
    }
}
