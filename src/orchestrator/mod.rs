//! Trending Orchestrator
//!
//! Resolves keyword requests cache-first. Each request moves through
//! `PENDING -> CACHE_CHECKED -> {CACHE_HIT | FETCHING} -> {RESOLVED | FALLBACK}`; results
//! always come back in input order and no keyword is ever dropped. Only caller errors
//! (too many keywords) are returned as `Err`.

mod fetch;

use crate::cache::{KeyStore, KeyTtl, StatsSnapshot, TrendCache};
use crate::config::Config;
use crate::error::{Result, TrendError};
use crate::repair::ResponseRepairPipeline;
use crate::retention::RetentionPolicy;
use crate::search::SearchClient;
use crate::strategy::FetchStrategySelector;
use crate::types::{cache_key, KeywordRequest, Topic, TrendingResult};
use crate::utils::search_url;
use crate::utils::timing::Timer;
use log::{debug, info};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// A whole `resolve` slower than this is logged as a warning.
const SLOW_RESOLVE_THRESHOLD: Duration = Duration::from_secs(30);

/// Cache-only lookup for progressive loading: what is ready now, and what still needs a fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedLookup {
    pub hits: Vec<TrendingResult>,
    pub misses: Vec<String>,
}

/// Topic substituted when a keyword could not be fetched at all.
pub fn unavailable_topic(keyword: &str) -> Topic {
    Topic {
        title: "Trending topics temporarily unavailable".to_string(),
        summary: format!(
            "Latest topics for \"{}\" could not be retrieved right now. Try refreshing later or open the search link.",
            keyword
        ),
        search_url: search_url(keyword, None),
        source_url: None,
    }
}

pub struct TrendingOrchestrator {
    config: Arc<Config>,
    cache: TrendCache,
    search: Arc<dyn SearchClient>,
    retention: RetentionPolicy,
    selector: FetchStrategySelector,
    pipeline: ResponseRepairPipeline,
}

impl TrendingOrchestrator {
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn KeyStore>,
        search: Arc<dyn SearchClient>,
    ) -> Self {
        info!(
            "Initializing TrendingOrchestrator (cache backend: {}, search client: {}, model: {})",
            store.backend_name(),
            search.name(),
            config.search_model
        );
        Self {
            cache: TrendCache::new(store),
            retention: RetentionPolicy::new(config.default_cache_ttl_secs()),
            selector: FetchStrategySelector::from_config(&config),
            pipeline: ResponseRepairPipeline::default(),
            search,
            config,
        }
    }

    /// Replaces the repair pipeline, e.g. to disable strategies.
    pub fn with_pipeline(mut self, pipeline: ResponseRepairPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn retention_policy(&self) -> &RetentionPolicy {
        &self.retention
    }

    pub fn selector(&self) -> &FetchStrategySelector {
        &self.selector
    }

    fn key_for(&self, keyword: &str) -> String {
        cache_key(&self.config.cache_key_prefix, keyword)
    }

    fn prefix(&self) -> String {
        format!("{}:", self.config.cache_key_prefix)
    }

    /// Rejects oversize calls and clamps every `max_results` into the configured range.
    fn prepare(&self, requests: &[KeywordRequest]) -> Result<Vec<KeywordRequest>> {
        if requests.len() > self.config.max_keywords {
            return Err(TrendError::TooManyKeywords {
                requested: requests.len(),
                max: self.config.max_keywords,
            });
        }
        Ok(requests
            .iter()
            .map(|r| {
                r.clamped(
                    self.config.min_results_per_keyword,
                    self.config.max_results_per_keyword,
                )
            })
            .collect())
    }

    /// Cache-first resolution. Valid cached entries are served as-is; everything else is
    /// fetched, repaired, written back and merged in input order.
    pub async fn resolve(&self, requests: &[KeywordRequest]) -> Result<Vec<TrendingResult>> {
        let requests = self.prepare(requests)?;
        let mut timer = Timer::start("resolve");

        let keys: Vec<String> = requests.iter().map(|r| self.key_for(r.keyword())).collect();
        let cached = self.cache.get_multiple(&keys).await;
        timer.checkpoint("cache_lookup");

        let mut slots: Vec<Option<TrendingResult>> = vec![None; requests.len()];
        let mut miss_indices = Vec::new();
        for (idx, (request, key)) in requests.iter().zip(&keys).enumerate() {
            match cached.get(key) {
                Some(record)
                    if self
                        .retention
                        .is_valid(record.result.last_updated, request.retention()) =>
                {
                    slots[idx] =
                        Some(record.result.from_cache(request.keyword(), request.max_results()));
                }
                Some(_) => {
                    debug!("Cached entry for '{}' is outside its retention window", request.keyword());
                    miss_indices.push(idx);
                }
                None => miss_indices.push(idx),
            }
        }
        info!(
            "Resolving {} keywords: {} cache hits, {} misses",
            requests.len(),
            requests.len() - miss_indices.len(),
            miss_indices.len()
        );

        if !miss_indices.is_empty() {
            let misses: Vec<KeywordRequest> =
                miss_indices.iter().map(|&idx| requests[idx].clone()).collect();
            let fetched = self.fetch_and_store(&misses).await;
            for (idx, result) in miss_indices.into_iter().zip(fetched) {
                slots[idx] = Some(result);
            }
            timer.checkpoint("fetch");
        }

        timer.finish_with_threshold(SLOW_RESOLVE_THRESHOLD);
        Ok(Self::assemble(&requests, slots))
    }

    /// Cache-only variant: never triggers a fetch.
    pub async fn resolve_cached_only(&self, requests: &[KeywordRequest]) -> Result<CachedLookup> {
        let requests = self.prepare(requests)?;
        let keys: Vec<String> = requests.iter().map(|r| self.key_for(r.keyword())).collect();
        let cached = self.cache.get_multiple(&keys).await;

        let mut lookup = CachedLookup {
            hits: Vec::new(),
            misses: Vec::new(),
        };
        for (request, key) in requests.iter().zip(&keys) {
            match cached.get(key) {
                Some(record)
                    if self
                        .retention
                        .is_valid(record.result.last_updated, request.retention()) =>
                {
                    lookup
                        .hits
                        .push(record.result.from_cache(request.keyword(), request.max_results()));
                }
                _ => lookup.misses.push(request.keyword().to_string()),
            }
        }
        debug!(
            "Cache-only lookup: {} hits, {} misses",
            lookup.hits.len(),
            lookup.misses.len()
        );
        Ok(lookup)
    }

    /// Treats every request as a miss and overwrites whatever is cached.
    pub async fn refresh(&self, requests: &[KeywordRequest]) -> Result<Vec<TrendingResult>> {
        let requests = self.prepare(requests)?;
        let mut timer = Timer::start("refresh");
        info!("Refreshing {} keywords, bypassing cache", requests.len());
        let fetched = self.fetch_and_store(&requests).await;
        timer.checkpoint("fetch");
        timer.finish_with_threshold(self.config.batch_timeout());
        Ok(Self::assemble(&requests, fetched.into_iter().map(Some).collect()))
    }

    fn assemble(
        requests: &[KeywordRequest],
        slots: Vec<Option<TrendingResult>>,
    ) -> Vec<TrendingResult> {
        requests
            .iter()
            .zip(slots)
            .map(|(request, slot)| {
                slot.unwrap_or_else(|| {
                    TrendingResult::fresh(request.keyword(), vec![unavailable_topic(request.keyword())])
                })
            })
            .collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.cache.stats()
    }

    /// Operator action: zero the hit/miss/error counters.
    pub fn reset_stats(&self) {
        info!("Resetting cache statistics");
        self.cache.reset_stats();
    }

    /// Remaining TTL of every live key under this orchestrator's prefix.
    pub async fn cache_info(&self) -> Vec<KeyTtl> {
        self.cache.ttl_listing(&self.prefix()).await
    }

    /// Drops the entry for one keyword, or every entry under the prefix when `None`.
    /// Returns how many entries were removed.
    pub async fn invalidate(&self, keyword: Option<&str>) -> usize {
        match keyword {
            Some(keyword) => {
                let key = self.key_for(keyword);
                let removed = usize::from(self.cache.delete(&key).await);
                info!("Invalidated cache key {} ({} removed)", key, removed);
                removed
            }
            None => {
                let removed = self.cache.clear(&self.prefix()).await;
                info!("Cleared {} cached keywords", removed);
                removed
            }
        }
    }
}
