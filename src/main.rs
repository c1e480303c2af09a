// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use trending_topics::{
    cache::{KeyStore, MemoryKeyStore, RedisKeyStore},
    config::{load_config, CacheBackendKind, Config},
    orchestrator::TrendingOrchestrator,
    search::HttpSearchClient,
    types::{KeywordRequest, Retention},
    utils::setup_logging,
};

#[derive(Parser)]
#[command(name = "trending-topics")]
#[command(about = "Resolve keywords into trending topic summaries")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve keywords, serving cached results when still valid
    Resolve {
        /// Keywords to resolve, in output order
        #[arg(required = true)]
        keywords: Vec<String>,

        /// Topics per keyword (clamped to the configured range)
        #[arg(short, long, default_value_t = 5)]
        max_results: usize,

        /// Cache retention for these keywords, e.g. 6h or 2d
        #[arg(short, long)]
        retention: Option<Retention>,

        /// Ignore cached entries and fetch everything
        #[arg(long, conflicts_with = "cached_only")]
        refresh: bool,

        /// Only report what is already cached
        #[arg(long)]
        cached_only: bool,
    },

    /// List cached keys and their remaining TTL
    Info,

    /// Remove one keyword from the cache, or every keyword when none is given
    Invalidate { keyword: Option<String> },
}

async fn build_store(config: &Config) -> Result<Arc<dyn KeyStore>> {
    match config.cache_backend {
        CacheBackendKind::Redis => {
            let store = RedisKeyStore::new(&config.redis_url)
                .await
                .context("failed to connect to Redis")?;
            Ok(Arc::new(store))
        }
        CacheBackendKind::Memory => {
            let store = match config.cache_sweep_interval_secs {
                Some(secs) => MemoryKeyStore::with_sweeper(Duration::from_secs(secs)),
                None => MemoryKeyStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();
    setup_logging(std::env::var("LOG_LEVEL").ok().as_deref())?;
    let config = load_config()?;
    info!("trending-topics starting (cache backend: {})", config.cache_backend);

    let store = build_store(&config).await?;
    let search = Arc::new(HttpSearchClient::from_config(&config)?);
    let orchestrator = TrendingOrchestrator::new(config.clone(), store, search);

    match cli.command {
        Commands::Resolve {
            keywords,
            max_results,
            retention,
            refresh,
            cached_only,
        } => {
            let requests = keywords
                .iter()
                .map(|k| KeywordRequest::new(k, max_results, retention))
                .collect::<Result<Vec<_>, _>>()?;

            if cached_only {
                print_json(&orchestrator.resolve_cached_only(&requests).await?)?;
            } else if refresh {
                print_json(&orchestrator.refresh(&requests).await?)?;
            } else {
                print_json(&orchestrator.resolve(&requests).await?)?;
            }
        }
        Commands::Info => print_json(&orchestrator.cache_info().await)?,
        Commands::Invalidate { keyword } => {
            let removed = orchestrator.invalidate(keyword.as_deref()).await;
            if removed == 0 {
                warn!("Nothing to invalidate");
            }
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
    }

    let stats = orchestrator.stats();
    info!(
        "Cache stats: {} hits, {} misses, {} errors (hit rate {:.1}%)",
        stats.hits,
        stats.misses,
        stats.errors,
        stats.hit_rate * 100.0
    );
    Ok(())
}
