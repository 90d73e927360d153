/*
briefcast - single-binary main.rs
One invocation = one run: read episode memory, aggregate the day's content,
hand the bundle off to the generation stage, update memory.
*/

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use common::Config;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use briefcast::aggregator::Aggregator;
use briefcast::content::ContentBundle;
use briefcast::episode;
use briefcast::llm::remote::RemoteLlmProvider;
use briefcast::llm::{LlmProvider, LlmRequest, LlmResponse};
use briefcast::memory::{upsert_and_trim, DeduplicationIndex, EpisodeMemory};
use briefcast::memory_store::{MemoryStore, MemoryStoreError, VersionToken};
use briefcast::usage::UsageLedger;

const DEFAULT_DIGEST_WINDOW_DAYS: i64 = 7;

#[derive(Parser, Debug)]
#[command(name = "briefcast", about = "Briefcast daily aggregation run")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where to write the handoff bundle for the generation stage
    #[arg(long, value_name = "FILE", default_value = "briefcast.json")]
    out: PathBuf,

    /// Do not persist the episode memory update at the end of the run
    #[arg(long)]
    skip_memory_write: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Handoff consumed by the downstream generation stage.
#[derive(Serialize)]
struct Handoff<'a> {
    date: String,
    continuity: &'a str,
    bundle: &'a ContentBundle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let start_time = std::time::Instant::now();

    // Resolve config paths
    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() {
            Some(p)
        } else {
            None
        }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() {
            Some(&default_path)
        } else {
            None
        },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    info!(default = ?default_path, override_file = ?override_path, "configuration loaded");

    let ledger = Arc::new(UsageLedger::new());

    // Missing credentials degrade summarization; they do not abort the run
    let provider: Arc<dyn LlmProvider> = match create_llm_provider(&config) {
        Ok(provider) => {
            info!("LLM provider initialized: {}", provider.provider_tag());
            Arc::new(provider)
        }
        Err(e) => {
            warn!("LLM provider unavailable ({:#}), summarization will degrade", e);
            Arc::new(OfflineProvider)
        }
    };

    // Same policy for the memory backend: without it the run proceeds with
    // no continuity and no dedup
    let store = match create_memory_store(&config) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("memory backend unavailable ({:#}), continuing without memory", e);
            None
        }
    };

    // Memory read is the first checkpoint: dedup filtering needs it
    let (memory, version): (EpisodeMemory, Option<VersionToken>) = match &store {
        Some(store) => match store.read().await {
            Ok((memory, version)) => {
                info!(episodes = memory.episodes.len(), "episode memory loaded");
                (memory, version)
            }
            Err(e) => {
                warn!("failed to read episode memory ({}), proceeding without continuity", e);
                (EpisodeMemory::default(), None)
            }
        },
        None => (EpisodeMemory::default(), None),
    };

    let today = Local::now().date_naive();
    let dedup = DeduplicationIndex::new(&memory, today);
    let digest_window = config
        .memory
        .as_ref()
        .and_then(|m| m.digest_window_days)
        .unwrap_or(DEFAULT_DIGEST_WINDOW_DAYS);
    let continuity = dedup.continuity_digest(digest_window);

    // Unknown categories/leagues are deployment defects and fail here
    let aggregator = Aggregator::from_config(
        &config,
        Arc::clone(&provider),
        Arc::clone(&ledger),
        today,
    )?;

    let bundle = aggregator.aggregate(&dedup).await;
    info!(items = bundle.total_items(), "aggregation complete");

    // Hand the bundle off to the generation stage
    let handoff = Handoff {
        date: today.format("%Y-%m-%d").to_string(),
        continuity: &continuity,
        bundle: &bundle,
    };
    let json = serde_json::to_vec_pretty(&handoff).context("failed to serialize handoff")?;
    tokio::fs::write(&args.out, json)
        .await
        .with_context(|| format!("failed to write handoff file: {}", args.out.display()))?;
    info!(path = %args.out.display(), "handoff written");

    // Synthesize today's episode record and persist it, best-effort: the
    // primary deliverable is already on disk
    let record = episode::build_record(provider.as_ref(), &ledger, today, &bundle).await;

    if args.skip_memory_write {
        info!("memory write skipped via CLI (--skip-memory-write)");
    } else if let Some(store) = &store {
        let updated = upsert_and_trim(&memory, record);
        match store.write(&updated, version.as_ref()).await {
            Ok(()) => info!(episodes = updated.episodes.len(), "episode memory updated"),
            Err(MemoryStoreError::VersionConflict) => {
                warn!("episode memory write rejected: another writer updated it since our read");
            }
            Err(e) => {
                warn!("failed to write episode memory: {}", e);
            }
        }
    }

    for (provider_tag, usage) in ledger.totals() {
        info!(
            provider = %provider_tag,
            prompt_units = usage.prompt_units,
            completion_units = usage.completion_units,
            "usage total"
        );
    }

    info!(elapsed = ?start_time.elapsed(), "run complete");
    Ok(())
}

/// Create the remote LLM provider from configuration. The API key comes from
/// the environment variable named in the config.
fn create_llm_provider(config: &Config) -> Result<RemoteLlmProvider> {
    let llm = config.llm.as_ref().context("no [llm] section configured")?;

    let api_key_env = llm
        .api_key_env
        .as_deref()
        .context("Missing api_key_env in llm config")?;
    let api_key = std::env::var(api_key_env)
        .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

    let model = llm.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
    let api_url = llm
        .api_url
        .clone()
        .unwrap_or_else(|| "http://localhost:11434/v1/chat/completions".to_string());
    let timeout_secs = llm.timeout_seconds.unwrap_or(30);
    let max_tokens = llm.max_tokens.unwrap_or(500);

    Ok(RemoteLlmProvider::new(api_url, api_key, model).with_defaults(timeout_secs, max_tokens, 0.7))
}

/// Create the episode-memory store from configuration. The backend token
/// comes from the environment variable named in the config.
fn create_memory_store(config: &Config) -> Result<MemoryStore> {
    let memory = config.memory.as_ref().context("no [memory] section configured")?;

    let token_env = memory.token_env.as_deref().unwrap_or("BRIEFCAST_GITHUB_TOKEN");
    let token = std::env::var(token_env)
        .with_context(|| format!("memory backend token env var '{}' not set", token_env))?;

    let branch = memory.branch.clone().unwrap_or_else(|| "main".to_string());
    let mut store = MemoryStore::new(&memory.owner, &memory.repo, &memory.path, branch, token)?;
    if let Some(api_url) = &memory.api_url {
        store = store.with_api_url(api_url);
    }
    Ok(store)
}

/// Stand-in provider used when no usable LLM is configured. Every call
/// fails, so the summarization layer falls back to its degraded paths.
struct OfflineProvider;

#[async_trait::async_trait]
impl LlmProvider for OfflineProvider {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse> {
        anyhow::bail!("no LLM provider configured")
    }

    fn provider_tag(&self) -> &str {
        "offline"
    }
}
