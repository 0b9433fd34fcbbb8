//! Stage 2: enrich mined profiles with activity data.
//!
//! The enricher collaborator fetches follower counts and recent posts; this
//! module derives everything else (last-active recency, extracted links,
//! shipping signals). Profiles are marked enriched one at a time, on success
//! only, so an interrupted batch resumes where it stopped.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use regex::Regex;
use signalscout_common::{Config, ExtractedLink, Profile, ScoutError};
use signalscout_state::{PipelineState, Stage};
use tracing::{info, warn};

use crate::store::{load_profiles, save_profiles, upsert_by_handle};
use crate::traits::{ActivityData, ProfileEnricher};

// ---------------------------------------------------------------------------
// Shipping signals + link extraction
// ---------------------------------------------------------------------------

const SHIPPING_KEYWORDS: &[&str] = &[
    "shipped", "launched", "released", "deployed", "pushed to prod",
    "live now", "just built", "open sourced", "open-sourced",
    "demo", "beta", "alpha", "v1", "v2", "mvp", "prototype",
    "building", "shipping", "working on", "side project",
];

static RE_GITHUB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"github\.com/([A-Za-z0-9_-]+(?:/[A-Za-z0-9_.-]+)?)").unwrap()
});
static RE_HUGGINGFACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"huggingface\.co/([A-Za-z0-9_-]+)").unwrap());
static RE_PRODUCT_HUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"producthunt\.com/posts/([A-Za-z0-9_-]+)").unwrap());
static RE_LINKEDIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"linkedin\.com/in/([A-Za-z0-9_-]+)").unwrap());
static RE_YOUTUBE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:youtube\.com|youtu\.be)/([A-Za-z0-9_-]+)").unwrap());
static RE_WEBSITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:[A-Za-z0-9-]+\.)+[a-z]{2,}[^\s]*").unwrap()
});

const WEBSITE_EXCLUDED_DOMAINS: &[&str] = &[
    "twitter.com",
    "x.com",
    "t.co",
    "github.com",
    "linkedin.com",
];

struct LinkPattern {
    platform: &'static str,
    regex: &'static LazyLock<Regex>,
    base: &'static str,
}

const LINK_PATTERNS: &[LinkPattern] = &[
    LinkPattern {
        platform: "github",
        regex: &RE_GITHUB,
        base: "https://github.com/",
    },
    LinkPattern {
        platform: "huggingface",
        regex: &RE_HUGGINGFACE,
        base: "https://huggingface.co/",
    },
    LinkPattern {
        platform: "product_hunt",
        regex: &RE_PRODUCT_HUNT,
        base: "https://producthunt.com/posts/",
    },
    LinkPattern {
        platform: "linkedin",
        regex: &RE_LINKEDIN,
        base: "https://linkedin.com/in/",
    },
    LinkPattern {
        platform: "youtube",
        regex: &RE_YOUTUBE,
        base: "https://youtube.com/",
    },
];

/// Extract platform links from free text. Generic website URLs are kept
/// last, excluding domains already covered by a platform pattern.
pub fn extract_links(text: &str, source: &str) -> Vec<ExtractedLink> {
    let mut links = Vec::new();
    if text.is_empty() {
        return links;
    }

    for pattern in LINK_PATTERNS {
        for caps in pattern.regex.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                links.push(ExtractedLink {
                    platform: pattern.platform.to_string(),
                    url: format!("{}{}", pattern.base, m.as_str()),
                    source: source.to_string(),
                });
            }
        }
    }

    for m in RE_WEBSITE.find_iter(text) {
        let url = m.as_str();
        if WEBSITE_EXCLUDED_DOMAINS.iter().any(|d| url.contains(d)) {
            continue;
        }
        links.push(ExtractedLink {
            platform: "website".to_string(),
            url: url.to_string(),
            source: source.to_string(),
        });
    }

    links
}

/// Shipping-related keywords present in the text, lowercased match.
pub fn detect_shipping_signals(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let lower = text.to_lowercase();
    SHIPPING_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .map(|kw| kw.to_string())
        .collect()
}

/// Fold fetched activity data into a profile and derive the enrichment
/// fields: last-active recency, links, shipping signals.
pub fn apply_activity(profile: &mut Profile, data: ActivityData) {
    let now = Utc::now();

    if data.display_name.is_some() {
        profile.display_name = data.display_name;
    }
    if data.bio.is_some() {
        profile.bio = data.bio;
    }
    if data.platform_id.is_some() {
        profile.platform_id = data.platform_id;
    }
    if data.followers_count.is_some() {
        profile.followers_count = data.followers_count;
    }
    if data.following_count.is_some() {
        profile.following_count = data.following_count;
    }
    if data.tweet_count.is_some() {
        profile.tweet_count = data.tweet_count;
    }
    profile.verified = data.verified;
    if data.profile_image_url.is_some() {
        profile.profile_image_url = data.profile_image_url;
    }
    if data.location.is_some() {
        profile.location = data.location;
    }
    if data.website.is_some() {
        profile.website = data.website;
    }
    if data.account_created_at.is_some() {
        profile.account_created_at = data.account_created_at;
    }
    profile.posts = data.posts;

    profile.last_active = profile.posts.iter().filter_map(|p| p.created_at).max();
    profile.days_since_active = profile
        .last_active
        .map(|last| (now - last).num_days().max(0));

    let mut links = Vec::new();
    let mut shipping = Vec::new();
    if let Some(bio) = &profile.bio {
        links.extend(extract_links(bio, "bio"));
        shipping.extend(detect_shipping_signals(bio));
    }
    for post in &profile.posts {
        links.extend(extract_links(&post.text, "post"));
        shipping.extend(detect_shipping_signals(&post.text));
    }
    links.dedup_by(|a, b| a.url == b.url);
    shipping.sort();
    shipping.dedup();

    profile.extracted_links = links;
    profile.has_shipping_signals = !shipping.is_empty();
    profile.shipping_keywords = shipping;
    profile.enriched_at = Some(now);
}

// ---------------------------------------------------------------------------
// Stage runner
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct EnrichOutcome {
    pub enriched: usize,
    pub failed: usize,
}

/// Run the enrichment stage. `limit` caps the batch; failures are logged and
/// left unmarked so the next run retries them.
pub async fn run_enrich(
    state: &mut PipelineState,
    config: &Config,
    enricher: &dyn ProfileEnricher,
    limit: Option<usize>,
) -> Result<EnrichOutcome> {
    let raw = load_profiles(&config.profiles_raw_file());
    let mut enriched_set = load_profiles(&config.profiles_enriched_file());

    let mut work = state.unprocessed(Stage::Enriched, Some(Stage::Mined));
    if let Some(limit) = limit {
        work.truncate(limit);
    }
    info!(profiles = work.len(), "Enrichment batch starting");

    let mut outcome = EnrichOutcome::default();
    let pace = Duration::from_secs(config.scrape_interval_secs);

    for (i, handle) in work.iter().enumerate() {
        if i > 0 && !pace.is_zero() {
            tokio::time::sleep(pace).await;
        }

        let mut profile = raw
            .iter()
            .find(|p| &p.handle == handle)
            .cloned()
            .unwrap_or_else(|| Profile::skeleton(handle, None));

        match enricher.enrich(handle).await {
            Ok(data) => {
                apply_activity(&mut profile, data);
                enriched_set = upsert_by_handle(enriched_set, vec![profile]);
                save_profiles(&config.profiles_enriched_file(), &enriched_set)?;
                state.mark_processed(handle, Stage::Enriched)?;
                outcome.enriched += 1;
            }
            Err(e) => {
                warn!(handle = handle.as_str(), error = %e, "Enrichment failed, will retry next run");
                outcome.failed += 1;
            }
        }
    }

    info!(
        enriched = outcome.enriched,
        failed = outcome.failed,
        "Enrichment complete"
    );
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// X API enricher (production implementation)
// ---------------------------------------------------------------------------

/// Enricher backed by the X API v2 (bearer token). Fetches the user record
/// and their recent posts with public metrics.
pub struct XApiEnricher {
    bearer_token: String,
    http: reqwest::Client,
    base_url: String,
    max_posts: usize,
}

impl XApiEnricher {
    pub fn new(bearer_token: &str, max_posts: usize) -> Self {
        Self {
            bearer_token: bearer_token.to_string(),
            http: reqwest::Client::new(),
            base_url: "https://api.x.com/2".to_string(),
            max_posts,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ScoutError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| ScoutError::Enrichment(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ScoutError::Enrichment(format!("X API error ({status})")));
        }
        response
            .json()
            .await
            .map_err(|e| ScoutError::Enrichment(format!("malformed response: {e}")))
    }
}

#[async_trait::async_trait]
impl ProfileEnricher for XApiEnricher {
    async fn enrich(&self, handle: &str) -> Result<ActivityData, ScoutError> {
        let user_url = format!(
            "{}/users/by/username/{handle}?user.fields=description,public_metrics,verified,profile_image_url,location,url,created_at",
            self.base_url
        );
        let user: XUserResponse = self.get_json(&user_url).await?;
        let user = user
            .data
            .ok_or_else(|| ScoutError::Enrichment(format!("no such user: {handle}")))?;

        let tweets_url = format!(
            "{}/users/{}/tweets?max_results={}&tweet.fields=public_metrics,created_at,referenced_tweets",
            self.base_url,
            user.id,
            self.max_posts.clamp(5, 100)
        );
        let tweets: XTweetsResponse = self.get_json(&tweets_url).await?;

        let posts = tweets
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|t| {
                let metrics = t.public_metrics.unwrap_or_default();
                let is_retweet = t
                    .referenced_tweets
                    .iter()
                    .flatten()
                    .any(|r| r.kind == "retweeted");
                let is_reply = t
                    .referenced_tweets
                    .iter()
                    .flatten()
                    .any(|r| r.kind == "replied_to");
                signalscout_common::Post {
                    text: t.text,
                    created_at: t.created_at,
                    like_count: metrics.like_count,
                    retweet_count: metrics.retweet_count,
                    reply_count: metrics.reply_count,
                    view_count: metrics.impression_count,
                    is_reply,
                    is_retweet,
                    url: t
                        .id
                        .as_deref()
                        .map(|id| format!("https://x.com/{handle}/status/{id}")),
                }
            })
            .collect();

        let user_metrics = user.public_metrics.unwrap_or_default();
        Ok(ActivityData {
            display_name: user.name,
            bio: user.description,
            platform_id: Some(user.id),
            followers_count: Some(user_metrics.followers_count),
            following_count: Some(user_metrics.following_count),
            tweet_count: Some(user_metrics.tweet_count),
            verified: user.verified.unwrap_or(false),
            profile_image_url: user.profile_image_url,
            location: user.location,
            website: user.url,
            account_created_at: user.created_at,
            posts,
        })
    }
}

#[derive(serde::Deserialize)]
struct XUserResponse {
    data: Option<XUser>,
}

#[derive(serde::Deserialize)]
struct XUser {
    id: String,
    name: Option<String>,
    description: Option<String>,
    verified: Option<bool>,
    profile_image_url: Option<String>,
    location: Option<String>,
    url: Option<String>,
    created_at: Option<chrono::DateTime<Utc>>,
    public_metrics: Option<XUserMetrics>,
}

#[derive(serde::Deserialize, Default)]
struct XUserMetrics {
    #[serde(default)]
    followers_count: u64,
    #[serde(default)]
    following_count: u64,
    #[serde(default)]
    tweet_count: u64,
}

#[derive(serde::Deserialize)]
struct XTweetsResponse {
    data: Option<Vec<XTweet>>,
}

#[derive(serde::Deserialize)]
struct XTweet {
    id: Option<String>,
    text: String,
    created_at: Option<chrono::DateTime<Utc>>,
    public_metrics: Option<XTweetMetrics>,
    referenced_tweets: Option<Vec<XTweetRef>>,
}

#[derive(serde::Deserialize, Default)]
struct XTweetMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    impression_count: u64,
}

#[derive(serde::Deserialize)]
struct XTweetRef {
    #[serde(rename = "type")]
    kind: String,
}
