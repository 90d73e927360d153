use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::llm::UsageMetadata;

/// One call's usage attributed to a provider.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub provider: String,
    pub units: UsageMetadata,
}

/// Accumulates heterogeneous per-provider usage counters across a whole run.
/// Shared behind an `Arc` by every component that talks to a provider; the
/// totals are queried once at the end of the run.
#[derive(Debug, Default)]
pub struct UsageLedger {
    totals: Mutex<BTreeMap<String, UsageMetadata>>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one call's usage under a provider tag. `None` is a no-op since
    /// every upstream capability may degrade to "no usage" on failure. Zero
    /// values are valid and are still added.
    pub fn record(&self, provider: &str, usage: Option<&UsageMetadata>) {
        let Some(usage) = usage else {
            return;
        };
        let mut totals = self.totals.lock().expect("usage ledger poisoned");
        totals.entry(provider.to_string()).or_default().add(usage);
    }

    /// Snapshot of per-provider totals.
    pub fn totals(&self) -> BTreeMap<String, UsageMetadata> {
        self.totals.lock().expect("usage ledger poisoned").clone()
    }
}
