use anyhow::{Context, Result};
use feed_rs::model::Feed;
use feed_rs::parser;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::content::ContentItem;

/// Fetches a feed from the given URL and parses it.
/// Retries transient failures (network errors, 5xx, 429) with exponential
/// backoff; other client errors fail fast.
pub async fn fetch_and_parse_feed(url: &str, timeout_secs: u64) -> Result<Feed> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("Briefcast/0.1.0")
        .build()
        .context("failed to build reqwest client")?;

    let max_retries = 3;
    let mut last_error = None;

    for attempt in 1..=max_retries {
        if attempt > 1 {
            let backoff = Duration::from_secs(2u64.pow(attempt - 2)); // 1s, 2s, 4s...
            tracing::info!(
                "Retrying feed fetch for {} (attempt {}/{}) after {:?}...",
                url,
                attempt,
                max_retries,
                backoff
            );
            tokio::time::sleep(backoff).await;
        }

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let bytes = response.bytes().await.context("failed to read response body")?;
                    let feed = parser::parse(bytes.as_ref()).context("failed to parse feed")?;
                    return Ok(feed);
                } else if status.is_server_error() {
                    last_error = Some(anyhow::anyhow!("server error: {}", status));
                    continue;
                } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(anyhow::anyhow!("rate limited: {}", status));
                    continue;
                } else {
                    // Client error (4xx) - likely permanent, don't retry
                    return Err(anyhow::anyhow!("feed fetch failed with status: {}", status));
                }
            }
            Err(e) => {
                // Network error - retry
                last_error = Some(anyhow::Error::new(e).context("network error during fetch"));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
}

/// Normalize parsed feed entries into content items. Handles both RSS
/// (`item`/`pubDate`) and Atom (`entry`/`published`/`updated`) shapes, which
/// the parser exposes through one model. Entries without a title are
/// dropped; entries without a `link` element fall back to the first anchor
/// found in the embedded content HTML.
pub fn entries_to_items(feed: &Feed, source: &str, max_items: usize) -> Vec<ContentItem> {
    let mut items = Vec::new();

    for entry in &feed.entries {
        if items.len() >= max_items {
            break;
        }

        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default();
        if title.is_empty() {
            debug!("skipping entry without title from {}", source);
            continue;
        }

        let content_body = entry
            .content
            .as_ref()
            .and_then(|c| c.body.clone())
            .unwrap_or_default();

        let url = entry
            .links
            .first()
            .map(|l| l.href.clone())
            .or_else(|| link_from_content_html(&content_body));

        let date = entry
            .published
            .or(entry.updated)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        let raw_summary = entry
            .summary
            .as_ref()
            .map(|s| s.content.clone())
            .unwrap_or(content_body);
        let summary = plain_text(&raw_summary, 500);

        items.push(ContentItem {
            title,
            summary,
            source: source.to_string(),
            date,
            url,
        });
    }

    items
}

/// Flatten an HTML fragment to plain text, capped at `max_chars`.
pub(crate) fn plain_text(html: &str, max_chars: usize) -> String {
    let text = match html2text::from_read(html.as_bytes(), 80) {
        Ok(text) => text,
        Err(_) => html.to_string(),
    };
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        trimmed.chars().take(max_chars).collect()
    }
}

/// Some Atom feeds carry no `link` element and bury the article URL inside
/// the entry's content HTML. Pull out the first anchor href.
fn link_from_content_html(html: &str) -> Option<String> {
    if html.is_empty() {
        return None;
    }
    let fragment = scraper::Html::parse_fragment(html);
    let selector = scraper::Selector::parse("a[href]").ok()?;
    fragment
        .select(&selector)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.to_string())
}
