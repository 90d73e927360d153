use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDate};
use std::sync::Arc;
use tracing::{info, warn};

use crate::content::{Category, ContentBundle, ContentItem, SourceResult};
use crate::llm::{summarizer, LlmProvider};
use crate::memory::DeduplicationIndex;
use crate::sports::{league_name, ScoreboardClient};
use crate::usage::UsageLedger;
use crate::{ingestion, scraping};
use common::{Config, ScrapeConfig};

const DEFAULT_FEED_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_ITEMS_PER_FEED: usize = 5;
const DEFAULT_ARTICLE_LOOKBACK_DAYS: i64 = 7;
const DEFAULT_MAX_ARTICLE_CANDIDATES: usize = 3;

/// A single fetchable content source. The fetch contract is infallible:
/// transport, parse and timeout failures are logged inside the source and
/// reduce to an empty result, so one broken source can never sink the batch.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    fn category(&self) -> Category;
    fn label(&self) -> String;
    async fn fetch(&self) -> SourceResult;
}

/// RSS/Atom feed source.
pub struct FeedSource {
    pub url: String,
    pub label: String,
    pub category: Category,
    pub max_items: usize,
    pub timeout_secs: u64,
}

#[async_trait::async_trait]
impl ContentSource for FeedSource {
    fn category(&self) -> Category {
        self.category
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    async fn fetch(&self) -> SourceResult {
        match ingestion::fetch_and_parse_feed(&self.url, self.timeout_secs).await {
            Ok(feed) => {
                let items = ingestion::entries_to_items(&feed, &self.label, self.max_items);
                SourceResult::items(items)
            }
            Err(e) => {
                warn!("feed source '{}' failed: {:#}", self.label, e);
                SourceResult::empty()
            }
        }
    }
}

/// Selector-driven page scrape source.
pub struct ScrapeSource {
    pub target: ScrapeConfig,
    pub category: Category,
    pub timeout_secs: u64,
}

#[async_trait::async_trait]
impl ContentSource for ScrapeSource {
    fn category(&self) -> Category {
        self.category
    }

    fn label(&self) -> String {
        self.target
            .label
            .clone()
            .unwrap_or_else(|| self.target.url.clone())
    }

    async fn fetch(&self) -> SourceResult {
        match scraping::scrape_page(&self.target, self.timeout_secs).await {
            Ok(items) => SourceResult::items(items),
            Err(e) => {
                warn!("scrape source '{}' failed: {:#}", self.label(), e);
                SourceResult::empty()
            }
        }
    }
}

/// Per-team scoreboard source, scoped to yesterday's games.
pub struct SportsSource {
    pub client: Arc<ScoreboardClient>,
    pub league: String,
    pub team: String,
    pub date: NaiveDate,
}

#[async_trait::async_trait]
impl ContentSource for SportsSource {
    fn category(&self) -> Category {
        Category::Sports
    }

    fn label(&self) -> String {
        format!("{} {}", self.league, self.team)
    }

    async fn fetch(&self) -> SourceResult {
        match self
            .client
            .team_event_on(&self.league, &self.team, self.date)
            .await
        {
            // No game yesterday is a normal empty day
            Ok(None) => SourceResult::empty(),
            Ok(Some(item)) => SourceResult::items(vec![item]),
            Err(e) => {
                warn!("sports source '{}' failed: {:#}", self.label(), e);
                SourceResult::empty()
            }
        }
    }
}

/// A category whose raw items are condensed into a single summarized item.
pub struct CondenseSpec {
    pub category: Category,
    /// Title given to the condensed item
    pub title: String,
    pub instruction: String,
}

/// Fan-out/fan-in fetch orchestrator. Built once per run; `aggregate` never
/// fails - configuration problems surface from `from_config` instead.
pub struct Aggregator {
    enabled: Vec<Category>,
    sources: Vec<Arc<dyn ContentSource>>,
    provider: Arc<dyn LlmProvider>,
    ledger: Arc<UsageLedger>,
    condense: Vec<CondenseSpec>,
    article_lookback_days: i64,
    max_article_candidates: usize,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("enabled", &self.enabled)
            .field("sources", &self.sources.len())
            .field("condense", &self.condense.len())
            .field("article_lookback_days", &self.article_lookback_days)
            .field("max_article_candidates", &self.max_article_candidates)
            .finish()
    }
}

impl Aggregator {
    /// Direct construction with pre-built sources, used by tests and by
    /// `from_config`.
    pub fn new(
        enabled: Vec<Category>,
        sources: Vec<Arc<dyn ContentSource>>,
        provider: Arc<dyn LlmProvider>,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            enabled,
            sources,
            provider,
            ledger,
            condense: Vec::new(),
            article_lookback_days: DEFAULT_ARTICLE_LOOKBACK_DAYS,
            max_article_candidates: DEFAULT_MAX_ARTICLE_CANDIDATES,
        }
    }

    pub fn with_condense(mut self, spec: CondenseSpec) -> Self {
        self.condense.push(spec);
        self
    }

    pub fn with_article_policy(mut self, lookback_days: i64, max_candidates: usize) -> Self {
        self.article_lookback_days = lookback_days;
        self.max_article_candidates = max_candidates;
        self
    }

    /// Wire sources from configuration. The only fatal paths here are
    /// deployment defects: unknown league keys and malformed event windows.
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn LlmProvider>,
        ledger: Arc<UsageLedger>,
        today: NaiveDate,
    ) -> Result<Self> {
        let fetch = config.fetch.as_ref();
        let feed_timeout = fetch
            .and_then(|f| f.feed_timeout_seconds)
            .unwrap_or(DEFAULT_FEED_TIMEOUT_SECS);
        let page_timeout = fetch
            .and_then(|f| f.page_timeout_seconds)
            .unwrap_or(DEFAULT_PAGE_TIMEOUT_SECS);
        let max_items = fetch
            .and_then(|f| f.max_items_per_feed)
            .unwrap_or(DEFAULT_MAX_ITEMS_PER_FEED);

        let mut enabled = Vec::new();
        let mut sources: Vec<Arc<dyn ContentSource>> = Vec::new();
        let mut condense = Vec::new();

        let add_feeds = |sources: &mut Vec<Arc<dyn ContentSource>>,
                             category: Category,
                             feeds: &[common::FeedConfig],
                             scrapes: &[ScrapeConfig]| {
            for feed in feeds {
                sources.push(Arc::new(FeedSource {
                    url: feed.url.clone(),
                    label: feed.label.clone().unwrap_or_else(|| feed.url.clone()),
                    category,
                    max_items,
                    timeout_secs: feed_timeout,
                }));
            }
            for scrape in scrapes {
                sources.push(Arc::new(ScrapeSource {
                    target: scrape.clone(),
                    category,
                    timeout_secs: page_timeout,
                }));
            }
        };

        if let Some(news) = config.categories.news.as_ref().filter(|c| c.enabled) {
            enabled.push(Category::News);
            add_feeds(&mut sources, Category::News, &news.feeds, &news.scrapes);
        }

        if let Some(intl) = config
            .categories
            .international
            .as_ref()
            .filter(|c| c.enabled)
        {
            enabled.push(Category::International);
            add_feeds(&mut sources, Category::International, &intl.feeds, &intl.scrapes);
        }

        if let Some(sports) = config.categories.sports.as_ref().filter(|c| c.enabled) {
            enabled.push(Category::Sports);
            if !sports.teams.is_empty() {
                let api_key = match sports.api_key_env.as_deref() {
                    Some(var) => std::env::var(var)
                        .with_context(|| format!("sports API key env var '{}' not set", var))?,
                    // Free-tier key of the public scoreboard API
                    None => "3".to_string(),
                };
                let client = Arc::new(ScoreboardClient::new(api_key, feed_timeout)?);
                let yesterday = today - Duration::days(1);
                for team in &sports.teams {
                    let league = league_name(&team.league)?;
                    sources.push(Arc::new(SportsSource {
                        client: Arc::clone(&client),
                        league: league.to_string(),
                        team: team.team.clone(),
                        date: yesterday,
                    }));
                }
            }
        }

        if let Some(re) = config.categories.real_estate.as_ref().filter(|c| c.enabled) {
            enabled.push(Category::RealEstate);
            add_feeds(&mut sources, Category::RealEstate, &re.feeds, &re.scrapes);
            condense.push(CondenseSpec {
                category: Category::RealEstate,
                title: "Real estate roundup".to_string(),
                instruction: re.instruction.clone().unwrap_or_else(|| {
                    "Condense these real estate listings into a short market rundown \
                     for a daily briefing. Keep it under 120 words."
                        .to_string()
                }),
            });
        }

        if let Some(articles) = config.categories.articles.as_ref().filter(|c| c.enabled) {
            enabled.push(Category::Articles);
            add_feeds(&mut sources, Category::Articles, &articles.feeds, &[]);
        }

        if let Some(event) = config.categories.live_event.as_ref().filter(|c| c.enabled) {
            enabled.push(Category::LiveEvent);
            // Fetches are skipped outside the event window; the bucket stays
            if event_window_active(today, event.starts.as_deref(), event.ends.as_deref())? {
                let name = event.name.clone().unwrap_or_else(|| "Live event".to_string());
                add_feeds(&mut sources, Category::LiveEvent, &event.feeds, &[]);
                condense.push(CondenseSpec {
                    category: Category::LiveEvent,
                    title: format!("{} update", name),
                    instruction: event.instruction.clone().unwrap_or_else(|| {
                        format!(
                            "Condense these updates about {} into a short recap \
                             for a daily briefing. Keep it under 120 words.",
                            name
                        )
                    }),
                });
            }
        }

        let mut aggregator = Self::new(enabled, sources, provider, ledger);
        aggregator.condense = condense;
        if let Some(memory) = config.memory.as_ref() {
            if let Some(days) = memory.article_lookback_days {
                aggregator.article_lookback_days = days;
            }
        }
        if let Some(cap) = config
            .categories
            .articles
            .as_ref()
            .and_then(|a| a.max_candidates)
        {
            aggregator.max_article_candidates = cap;
        }
        Ok(aggregator)
    }

    /// Run the fan-out. Total latency approaches the slowest single source:
    /// every fetch is spawned before any is awaited.
    pub async fn aggregate(&self, dedup: &DeduplicationIndex) -> ContentBundle {
        let mut bundle = ContentBundle::new(&self.enabled);

        let mut handles = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let source = Arc::clone(source);
            let label = source.label();
            let category = source.category();
            let handle = tokio::spawn(async move { source.fetch().await });
            handles.push((category, label, handle));
        }

        for (category, label, handle) in handles {
            match handle.await {
                Ok(result) => {
                    info!("source '{}' produced {} items", label, result.items.len());
                    if let Some(usage) = &result.usage {
                        self.ledger.record(&usage.provider, Some(&usage.units));
                    }
                    bundle.push_items(category, result.items);
                }
                Err(e) => {
                    warn!("source task '{}' panicked: {}", label, e);
                }
            }
        }

        // One summarizer call per condensed category, over the concatenation
        // of that category's raw items; the raw bucket stands on failure.
        for spec in &self.condense {
            let items = bundle.items(spec.category);
            if items.is_empty() {
                continue;
            }
            let payload = render_items(items);
            let condensed =
                summarizer::condense(self.provider.as_ref(), &spec.instruction, &payload).await;
            self.ledger
                .record(self.provider.provider_tag(), condensed.usage.as_ref());
            if !condensed.text.is_empty() {
                let source = items
                    .first()
                    .map(|i| i.source.clone())
                    .unwrap_or_default();
                bundle.replace_items(
                    spec.category,
                    vec![ContentItem {
                        title: spec.title.clone(),
                        summary: condensed.text,
                        source,
                        date: String::new(),
                        url: None,
                    }],
                );
            }
        }

        if self.enabled.contains(&Category::Articles) {
            let lookback = self.article_lookback_days;
            let cap = self.max_article_candidates;
            let items = bundle.items_mut(Category::Articles);
            let before = items.len();
            items.retain(|i| !dedup.was_covered(&i.title, lookback));
            let dropped = before - items.len();
            if dropped > 0 {
                info!("dedup dropped {} previously covered articles", dropped);
            }
            items.truncate(cap);
        }

        bundle
    }
}

fn render_items(items: &[ContentItem]) -> String {
    items
        .iter()
        .map(|i| {
            if i.summary.is_empty() {
                format!("- {}", i.title)
            } else {
                format!("- {}: {}", i.title, i.summary)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Temporal predicate for the live-event category. A missing window means
/// the category never activates; a malformed date is a configuration error.
fn event_window_active(
    today: NaiveDate,
    starts: Option<&str>,
    ends: Option<&str>,
) -> Result<bool> {
    let (Some(starts), Some(ends)) = (starts, ends) else {
        return Ok(false);
    };
    let starts = NaiveDate::parse_from_str(starts, "%Y-%m-%d")
        .map_err(|e| anyhow!("invalid live_event starts date '{}': {}", starts, e))?;
    let ends = NaiveDate::parse_from_str(ends, "%Y-%m-%d")
        .map_err(|e| anyhow!("invalid live_event ends date '{}': {}", ends, e))?;
    Ok(today >= starts && today <= ends)
}
