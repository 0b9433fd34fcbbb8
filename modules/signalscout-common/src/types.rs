use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Posts ---

/// A single post with engagement metrics, as captured during enrichment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Post {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub is_reply: bool,
    #[serde(default)]
    pub is_retweet: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A link extracted from a post or bio, tagged with the platform it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub platform: String,
    pub url: String,
    pub source: String,
}

// --- Profile ---

/// A tracked profile. Fields accumulate as the profile moves through the
/// pipeline: mining fills the identity fields, enrichment adds posts and
/// activity, scoring and classification add their outputs. Unfilled fields
/// stay `None`/empty and are skipped on serialization, so raw and fully
/// scored profiles share one on-disk shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_id: Option<String>,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_count: Option<u64>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found_via_tweet: Option<String>,
    pub discovered_at: DateTime<Utc>,

    // Enrichment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub posts: Vec<Post>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_since_active: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extracted_links: Vec<ExtractedLink>,
    #[serde(default)]
    pub has_shipping_signals: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shipping_keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enriched_at: Option<DateTime<Utc>>,

    // Scoring + classification
    #[serde(default)]
    pub signal_strength: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_breakdown: Option<ScoreBreakdown>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scored_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classified_at: Option<DateTime<Utc>>,
}

fn default_platform() -> String {
    "x".to_string()
}

impl Profile {
    /// A skeleton profile as created at mining time: identity only.
    pub fn skeleton(handle: &str, source_topic: Option<&str>) -> Self {
        Self {
            handle: handle.to_string(),
            display_name: None,
            bio: None,
            platform_id: None,
            platform: default_platform(),
            followers_count: None,
            following_count: None,
            tweet_count: None,
            verified: false,
            profile_url: Some(format!("https://x.com/{handle}")),
            profile_image_url: None,
            location: None,
            website: None,
            account_created_at: None,
            source_topic: source_topic.map(str::to_string),
            found_via_tweet: None,
            discovered_at: Utc::now(),
            posts: Vec::new(),
            last_active: None,
            days_since_active: None,
            extracted_links: Vec::new(),
            has_shipping_signals: false,
            shipping_keywords: Vec::new(),
            enriched_at: None,
            signal_strength: 0.0,
            score_breakdown: None,
            classification: None,
            scored_at: None,
            classified_at: None,
        }
    }

    /// Bio plus all post text, lowercased — the haystack for every keyword
    /// scorer.
    pub fn full_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.posts.len() + 1);
        if let Some(bio) = &self.bio {
            parts.push(bio);
        }
        for post in &self.posts {
            parts.push(&post.text);
        }
        parts.join(" ").to_lowercase()
    }
}

// --- Scoring ---

/// Detailed breakdown of the 6-component signal strength score.
/// Component maxima: llm_eval 35, semantic 20, technical 15,
/// tweet_engagement 15, links 10, profile_completeness 5.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub llm_eval: f64,
    #[serde(default)]
    pub llm_reasoning: String,
    #[serde(default)]
    pub semantic: f64,
    #[serde(default)]
    pub technical: f64,
    #[serde(default)]
    pub technical_keywords: Vec<String>,
    #[serde(default)]
    pub tweet_engagement: f64,
    #[serde(default)]
    pub engagement_details: EngagementDetails,
    #[serde(default)]
    pub links: f64,
    #[serde(default)]
    pub link_details: Vec<ExtractedLink>,
    #[serde(default)]
    pub profile_completeness: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EngagementDetails {
    #[serde(default)]
    pub avg_likes: f64,
    #[serde(default)]
    pub avg_retweets: f64,
}

// --- Classification ---

/// The five classification categories, in display order.
pub const CLASSIFICATION_CATEGORIES: [&str; 5] = [
    "Early-stage founder",
    "AI researcher",
    "AI operator",
    "Angel investor",
    "Noise/others",
];

/// The catch-all category used when a profile cannot be classified.
pub const NOISE_CATEGORY: &str = "Noise/others";

/// Dual classification result: LLM + semantic keyword similarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub llm_category: String,
    #[serde(default)]
    pub llm_confidence: f64,
    #[serde(default)]
    pub llm_reasoning: String,
    #[serde(default)]
    pub semantic_scores: HashMap<String, f64>,
    pub semantic_top_category: String,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            llm_category: NOISE_CATEGORY.to_string(),
            llm_confidence: 0.0,
            llm_reasoning: String::new(),
            semantic_scores: HashMap::new(),
            semantic_top_category: NOISE_CATEGORY.to_string(),
        }
    }
}
