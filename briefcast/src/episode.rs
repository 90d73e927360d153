use chrono::NaiveDate;
use std::fmt::Write as _;

use crate::content::{Category, ContentBundle};
use crate::llm::{summarizer, LlmProvider};
use crate::memory::EpisodeRecord;
use crate::usage::UsageLedger;

const MAX_KEY_TOPICS: usize = 8;

const SUMMARY_INSTRUCTION: &str = "You are writing the memory entry for today's briefing. \
     Summarize what was covered in two or three plain sentences. \
     No markdown, no preamble.";

const TOPICS_INSTRUCTION: &str =
    "List the main topics covered in today's briefing as short labels (one to three words each).";

/// Build the episode record that will be upserted into memory after the run.
/// Degrades gracefully: a dead summarizer yields an extractive recap and no
/// topics rather than a failure.
pub async fn build_record(
    provider: &dyn LlmProvider,
    ledger: &UsageLedger,
    date: NaiveDate,
    bundle: &ContentBundle,
) -> EpisodeRecord {
    let rundown = render_rundown(bundle);

    let condensed = summarizer::condense(provider, SUMMARY_INSTRUCTION, &rundown).await;
    ledger.record(provider.provider_tag(), condensed.usage.as_ref());
    let summary = if condensed.text.is_empty() {
        summarizer::fallback_recap(&headlines(bundle))
    } else {
        condensed.text
    };

    let (topics, usage) = summarizer::extract_list(provider, TOPICS_INSTRUCTION, &rundown).await;
    ledger.record(provider.provider_tag(), usage.as_ref());
    let key_topics = topics.into_iter().take(MAX_KEY_TOPICS).collect();

    let articles = bundle
        .items(Category::Articles)
        .iter()
        .map(|i| i.title.clone())
        .collect();

    EpisodeRecord {
        date: date.format("%Y-%m-%d").to_string(),
        summary,
        key_topics,
        articles,
    }
}

fn render_rundown(bundle: &ContentBundle) -> String {
    let mut rundown = String::new();
    for category in bundle.categories() {
        let items = bundle.items(category);
        if items.is_empty() {
            continue;
        }
        if !rundown.is_empty() {
            rundown.push('\n');
        }
        let _ = writeln!(rundown, "[{}]", category);
        for item in items {
            if item.summary.is_empty() {
                let _ = writeln!(rundown, "- {}", item.title);
            } else {
                let _ = writeln!(rundown, "- {}: {}", item.title, item.summary);
            }
        }
    }
    rundown
}

fn headlines(bundle: &ContentBundle) -> Vec<String> {
    bundle
        .categories()
        .flat_map(|c| bundle.items(c).iter())
        .map(|i| i.title.clone())
        .collect()
}
