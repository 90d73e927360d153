use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::usage::UsageRecord;

/// Logical grouping of sources sharing one topic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    News,
    Sports,
    RealEstate,
    Articles,
    International,
    LiveEvent,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::News => "news",
            Category::Sports => "sports",
            Category::RealEstate => "real_estate",
            Category::Articles => "articles",
            Category::International => "international",
            Category::LiveEvent => "live_event",
        };
        f.write_str(name)
    }
}

/// One normalized unit of fetched content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub title: String,
    /// Possibly LLM-condensed; may be empty
    pub summary: String,
    /// Provenance label
    pub source: String,
    /// Best-effort publication timestamp, free-form
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// What a single source fetch produces. Sources never fail; a broken or
/// timed-out source reduces to an empty result.
#[derive(Debug, Clone, Default)]
pub struct SourceResult {
    pub items: Vec<ContentItem>,
    pub usage: Option<UsageRecord>,
}

impl SourceResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(items: Vec<ContentItem>) -> Self {
        Self { items, usage: None }
    }
}

/// The per-run aggregation result. Every enabled category bucket is present
/// from construction on, possibly empty, so callers never branch on absence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentBundle {
    buckets: BTreeMap<Category, Vec<ContentItem>>,
}

impl ContentBundle {
    pub fn new(enabled: &[Category]) -> Self {
        let mut buckets = BTreeMap::new();
        for cat in enabled {
            buckets.insert(*cat, Vec::new());
        }
        Self { buckets }
    }

    /// Append items to a category bucket. Items with an empty title are
    /// discarded here, which is the single enforcement point for that
    /// invariant.
    pub fn push_items(&mut self, category: Category, items: Vec<ContentItem>) {
        let bucket = self.buckets.entry(category).or_default();
        bucket.extend(items.into_iter().filter(|i| !i.title.trim().is_empty()));
    }

    /// Replace a category bucket wholesale (used when a category is condensed
    /// down to a single summarized item).
    pub fn replace_items(&mut self, category: Category, items: Vec<ContentItem>) {
        self.buckets.insert(
            category,
            items
                .into_iter()
                .filter(|i| !i.title.trim().is_empty())
                .collect(),
        );
    }

    pub fn items(&self, category: Category) -> &[ContentItem] {
        self.buckets.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, category: Category) -> bool {
        self.buckets.contains_key(&category)
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.buckets.keys().copied()
    }

    pub fn total_items(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Mutable access for post-aggregation filtering (dedup, candidate caps).
    pub fn items_mut(&mut self, category: Category) -> &mut Vec<ContentItem> {
        self.buckets.entry(category).or_default()
    }
}
