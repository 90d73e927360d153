/*!
common/src/lib.rs

Shared configuration types for Briefcast.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fetching / politeness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for feed and API calls, in seconds
    pub feed_timeout_seconds: Option<u64>,
    /// Timeout for full-page fetches, in seconds
    pub page_timeout_seconds: Option<u64>,
    /// Maximum number of items kept per feed
    pub max_items_per_feed: Option<usize>,
}

/// Remote LLM endpoint config (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
}

/// Episode-memory persistence backend (contents-API blob storage)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub owner: String,
    pub repo: String,
    /// Path of the memory blob within the repository
    pub path: String,
    pub branch: Option<String>,
    /// Name of the environment variable holding the backend token
    pub token_env: Option<String>,
    /// Override of the backend API root (tests point this at a mock server)
    pub api_url: Option<String>,
    /// Lookback window for article-level deduplication, in days
    pub article_lookback_days: Option<i64>,
    /// Lookback window for the continuity digest, in days
    pub digest_window_days: Option<i64>,
}

/// One feed subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    /// Provenance label shown on items from this feed
    pub label: Option<String>,
}

/// One tracked team for the sports category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// League key, e.g. "nba" or "nhl"
    pub league: String,
    pub team: String,
}

/// One scrape target described by CSS selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub url: String,
    pub label: Option<String>,
    pub container_selector: String,
    pub title_selector: String,
    pub summary_selector: Option<String>,
    pub date_selector: Option<String>,
    pub max_items: Option<usize>,
}

/// A feed-backed category section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCategoryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub scrapes: Vec<ScrapeConfig>,
}

/// Sports category section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportsCategoryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub teams: Vec<TeamConfig>,
    /// Name of the environment variable holding the scoreboard API key
    pub api_key_env: Option<String>,
}

/// Condensed category section (summarized down to one item per run)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CondensedCategoryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub scrapes: Vec<ScrapeConfig>,
    /// Instruction handed to the summarizer for this category
    pub instruction: Option<String>,
}

/// Article-discussion category section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticlesCategoryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    /// Cap on candidates kept per run after deduplication
    pub max_candidates: Option<usize>,
}

/// Live multi-week event section, active only inside its date window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEventCategoryConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub name: Option<String>,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    /// First day of the event window, "YYYY-MM-DD"
    pub starts: Option<String>,
    /// Last day of the event window, "YYYY-MM-DD"
    pub ends: Option<String>,
    pub instruction: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Per-category grouping
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoriesConfig {
    pub news: Option<FeedCategoryConfig>,
    pub sports: Option<SportsCategoryConfig>,
    pub real_estate: Option<CondensedCategoryConfig>,
    pub articles: Option<ArticlesCategoryConfig>,
    pub international: Option<FeedCategoryConfig>,
    pub live_event: Option<LiveEventCategoryConfig>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub fetch: Option<FetchConfig>,
    pub llm: Option<LlmConfig>,
    pub memory: Option<MemoryConfig>,
    #[serde(default)]
    pub categories: CategoriesConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value =
                    toml::from_str(&data).context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
