use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write as _;

/// Bounded window of retained episodes.
pub const MAX_EPISODES: usize = 14;

/// One persisted memory entry, keyed by date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// "YYYY-MM-DD", unique within the store
    pub date: String,
    pub summary: String,
    /// 0-8 short labels
    #[serde(default)]
    pub key_topics: Vec<String>,
    /// Titles discussed in depth, used for deduplication
    #[serde(default)]
    pub articles: Vec<String>,
}

/// The persisted aggregate: episodes newest first, at most `MAX_EPISODES`.
/// A backend "not found" read maps to the default (empty) value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpisodeMemory {
    #[serde(default)]
    pub episodes: Vec<EpisodeRecord>,
}

/// Pure upsert: drop any existing record with the new record's date, prepend
/// the new record, truncate to `MAX_EPISODES`. Idempotent - applying the same
/// record twice yields the same trimmed prefix.
pub fn upsert_and_trim(memory: &EpisodeMemory, record: EpisodeRecord) -> EpisodeMemory {
    let mut episodes = Vec::with_capacity(memory.episodes.len() + 1);
    let date = record.date.clone();
    episodes.push(record);
    episodes.extend(memory.episodes.iter().filter(|e| e.date != date).cloned());
    episodes.truncate(MAX_EPISODES);
    EpisodeMemory { episodes }
}

pub(crate) fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Read-only view over an `EpisodeMemory` snapshot used to answer
/// "was this covered" and "what did we cover" queries. `today` is injected
/// so window math is deterministic under test.
pub struct DeduplicationIndex {
    episodes: Vec<EpisodeRecord>,
    today: NaiveDate,
}

impl DeduplicationIndex {
    pub fn new(memory: &EpisodeMemory, today: NaiveDate) -> Self {
        Self {
            episodes: memory.episodes.clone(),
            today,
        }
    }

    /// Records whose date falls within the lookback window, day granularity.
    /// Records with an unparseable date are treated as out of window.
    fn in_window(&self, window_days: i64) -> impl Iterator<Item = &EpisodeRecord> {
        let cutoff = self.today - Duration::days(window_days);
        self.episodes.iter().filter(move |e| {
            NaiveDate::parse_from_str(&e.date, "%Y-%m-%d")
                .map(|d| d >= cutoff)
                .unwrap_or(false)
        })
    }

    /// All article titles covered inside the window, normalized.
    pub fn covered_articles(&self, window_days: i64) -> HashSet<String> {
        self.in_window(window_days)
            .flat_map(|e| e.articles.iter())
            .map(|t| normalize_title(t))
            .collect()
    }

    /// Case-insensitive, whitespace-trimmed exact match. No fuzzy matching.
    pub fn was_covered(&self, title: &str, window_days: i64) -> bool {
        let wanted = normalize_title(title);
        self.in_window(window_days)
            .flat_map(|e| e.articles.iter())
            .any(|t| normalize_title(t) == wanted)
    }

    /// One line per in-window episode: `date: summary [Topics: t1, t2, ...]`.
    /// Returns the empty string when nothing falls in the window, which
    /// downstream generation must treat as "no prior context".
    pub fn continuity_digest(&self, window_days: i64) -> String {
        let mut digest = String::new();
        for episode in self.in_window(window_days) {
            if !digest.is_empty() {
                digest.push('\n');
            }
            let _ = write!(digest, "{}: {}", episode.date, episode.summary);
            if !episode.key_topics.is_empty() {
                let _ = write!(digest, " [Topics: {}]", episode.key_topics.join(", "));
            }
        }
        digest
    }
}
