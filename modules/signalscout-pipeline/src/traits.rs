//! Collaborator seams for the stage runners.
//!
//! Network-facing work (search, scraping, LLM calls) sits behind these
//! traits so stage runners stay testable with in-memory fakes and the state
//! machine never touches the network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signalscout_common::{Post, Profile, ScoutError};

/// Discovers profiles for a mining topic.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn discover(&self, topic: &str) -> Result<Vec<Profile>, ScoutError>;
}

/// Raw activity data fetched for one handle during enrichment.
#[derive(Debug, Clone, Default)]
pub struct ActivityData {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub platform_id: Option<String>,
    pub followers_count: Option<u64>,
    pub following_count: Option<u64>,
    pub tweet_count: Option<u64>,
    pub verified: bool,
    pub profile_image_url: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub account_created_at: Option<DateTime<Utc>>,
    pub posts: Vec<Post>,
}

/// Fetches activity data for a handle. Implementations may block for tens of
/// seconds per call; the enrich runner paces calls, not the implementation.
#[async_trait]
pub trait ProfileEnricher: Send + Sync {
    async fn enrich(&self, handle: &str) -> Result<ActivityData, ScoutError>;
}

/// A chat-completions model. Scoring and classification build their own
/// prompts and parse the returned text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ScoutError>;
}
