use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
///
/// API keys are optional: stages that need a missing key degrade (LLM
/// components score zero) rather than abort, matching operator expectations
/// for partial runs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory. All pipeline files live under it.
    pub data_dir: PathBuf,

    // LLM (DeepSeek-compatible chat completions)
    pub deepseek_api_key: Option<String>,
    pub deepseek_url: String,
    pub deepseek_model: String,

    // X API (enrichment)
    pub x_bearer_token: Option<String>,

    // Filter thresholds
    pub max_followers: u64,
    pub max_inactive_days: i64,

    // Pacing (caller-side; the state core never sleeps)
    pub max_posts_to_fetch: usize,
    pub scrape_interval_secs: u64,
    pub llm_request_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if a numeric var is malformed.
    pub fn from_env() -> Self {
        Self {
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),
            deepseek_api_key: env::var("DEEPSEEK_KEY").ok(),
            deepseek_url: env::var("DEEPSEEK_URL")
                .unwrap_or_else(|_| "https://api.deepseek.com".to_string()),
            deepseek_model: env::var("DEEPSEEK_MODEL")
                .unwrap_or_else(|_| "deepseek-chat".to_string()),
            x_bearer_token: env::var("X_BEARER_TOKEN").ok(),
            max_followers: parsed_env("MAX_FOLLOWERS", 10_000),
            max_inactive_days: parsed_env("MAX_INACTIVE_DAYS", 25),
            max_posts_to_fetch: parsed_env("MAX_POSTS_TO_FETCH", 10),
            scrape_interval_secs: parsed_env("SCRAPE_INTERVAL", 60),
            llm_request_interval_secs: parsed_env("LLM_REQUEST_INTERVAL", 10),
        }
    }

    /// Config rooted at an explicit data directory, defaults for everything
    /// else. Tests use this to point at isolated temp dirs without touching
    /// process-wide env state.
    pub fn at_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            deepseek_api_key: None,
            deepseek_url: "https://api.deepseek.com".to_string(),
            deepseek_model: "deepseek-chat".to_string(),
            x_bearer_token: None,
            max_followers: 10_000,
            max_inactive_days: 25,
            max_posts_to_fetch: 10,
            scrape_interval_secs: 0,
            llm_request_interval_secs: 0,
        }
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }

    pub fn profiles_raw_file(&self) -> PathBuf {
        self.data_dir.join("profiles_raw.json")
    }

    pub fn profiles_enriched_file(&self) -> PathBuf {
        self.data_dir.join("profiles_enriched.json")
    }

    pub fn profiles_filtered_file(&self) -> PathBuf {
        self.data_dir.join("profiles_filtered.json")
    }

    pub fn profiles_scored_file(&self) -> PathBuf {
        self.data_dir.join("profiles_scored.json")
    }

    pub fn profiles_classified_file(&self) -> PathBuf {
        self.data_dir.join("profiles_classified.json")
    }

    pub fn results_json_file(&self) -> PathBuf {
        self.data_dir.join("results.json")
    }

    pub fn results_csv_file(&self) -> PathBuf {
        self.data_dir.join("results.csv")
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got {raw:?}")),
        Err(_) => default,
    }
}
