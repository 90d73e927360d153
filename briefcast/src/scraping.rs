use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::content::ContentItem;
use common::ScrapeConfig;

const DEFAULT_MAX_ITEMS: usize = 5;

/// Fetch a page and extract records using the target's CSS selectors.
pub async fn scrape_page(target: &ScrapeConfig, timeout_secs: u64) -> Result<Vec<ContentItem>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("Briefcast/0.1.0")
        .build()
        .context("failed to build reqwest client")?;

    let response = client
        .get(&target.url)
        .send()
        .await
        .context("failed to fetch scrape target")?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("scrape fetch failed with status: {}", status));
    }

    let html = response
        .text()
        .await
        .context("failed to read scrape target body")?;

    extract_items(&html, target)
}

/// Selector-driven extraction: one record per container element, up to
/// `max_items`; a record lacking a title is dropped.
pub fn extract_items(html: &str, target: &ScrapeConfig) -> Result<Vec<ContentItem>> {
    let container = parse_selector(&target.container_selector)?;
    let title = parse_selector(&target.title_selector)?;
    let summary = target
        .summary_selector
        .as_deref()
        .map(parse_selector)
        .transpose()?;
    let date = target
        .date_selector
        .as_deref()
        .map(parse_selector)
        .transpose()?;

    let max_items = target.max_items.unwrap_or(DEFAULT_MAX_ITEMS);
    let source = target
        .label
        .clone()
        .unwrap_or_else(|| target.url.clone());

    let document = Html::parse_document(html);
    let mut items = Vec::new();

    for element in document.select(&container) {
        if items.len() >= max_items {
            break;
        }

        let title_text = element
            .select(&title)
            .next()
            .map(element_text)
            .unwrap_or_default();
        if title_text.is_empty() {
            debug!("scraping: dropping container without title on {}", target.url);
            continue;
        }

        let summary_text = summary
            .as_ref()
            .and_then(|s| element.select(s).next())
            .map(element_text)
            .unwrap_or_default();
        let date_text = date
            .as_ref()
            .and_then(|s| element.select(s).next())
            .map(element_text)
            .unwrap_or_default();

        items.push(ContentItem {
            title: title_text,
            summary: summary_text,
            source: source.clone(),
            date: date_text,
            url: None,
        });
    }

    Ok(items)
}

fn parse_selector(raw: &str) -> Result<Selector> {
    Selector::parse(raw).map_err(|e| anyhow!("invalid selector '{}': {}", raw, e))
}

fn element_text(element: scraper::ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
