//! Fetch paths for cache misses: one batched call, or one concurrent call per keyword.

use super::{unavailable_topic, TrendingOrchestrator};
use crate::error::TrendError;
use crate::repair::fallback_topic;
use crate::search::prompts::{batch_prompt, keyword_prompt};
use crate::types::{CacheRecord, KeywordRequest, Topic, TrendingResult};
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::time::Duration;

/// Per-keyword result of the FETCHING state.
#[derive(Debug)]
pub(super) enum KeywordOutcome {
    Resolved(Vec<Topic>),
    /// A response arrived but no repair strategy produced a valid topic.
    Unparseable,
    Failed(TrendError),
}

impl TrendingOrchestrator {
    /// Fetches every request, writes resolved results to the cache and returns one result per
    /// request, in request order. Fallback results are never cached.
    pub(super) async fn fetch_and_store(&self, requests: &[KeywordRequest]) -> Vec<TrendingResult> {
        if requests.is_empty() {
            return Vec::new();
        }

        let outcomes = if requests.len() > 1 && self.selector.should_batch(requests) {
            match self.fetch_batch(requests).await {
                Some(per_keyword) => per_keyword.into_iter().map(KeywordOutcome::Resolved).collect(),
                None => {
                    info!(
                        "Batch discarded, falling back to {} individual calls",
                        requests.len()
                    );
                    self.fetch_individual(requests).await
                }
            }
        } else {
            self.fetch_individual(requests).await
        };

        let mut results = Vec::with_capacity(requests.len());
        let mut records = Vec::new();
        let mut ttl_by_key = HashMap::new();
        for (request, outcome) in requests.iter().zip(outcomes) {
            let keyword = request.keyword();
            let result = match outcome {
                KeywordOutcome::Resolved(topics) => {
                    let result = TrendingResult::fresh(keyword, topics);
                    let key = self.key_for(keyword);
                    let ttl = self.retention.ttl_seconds(request.retention());
                    records.push((key.clone(), CacheRecord::new(result.clone(), ttl)));
                    ttl_by_key.insert(key, ttl);
                    result
                }
                KeywordOutcome::Unparseable => {
                    TrendingResult::fresh(keyword, vec![fallback_topic(keyword)])
                }
                KeywordOutcome::Failed(e) => {
                    warn!("Serving fallback for '{}': {} ({:?})", keyword, e, e.categorize());
                    TrendingResult::fresh(keyword, vec![unavailable_topic(keyword)])
                }
            };
            results.push(result);
        }

        self.store_results(records, ttl_by_key).await;
        results
    }

    /// Writes run on their own task so they finish even if the caller is cancelled.
    async fn store_results(&self, records: Vec<(String, CacheRecord)>, ttl_by_key: HashMap<String, u64>) {
        if records.is_empty() {
            return;
        }
        let cache = self.cache.clone();
        let count = records.len();
        let writes = tokio::spawn(async move { cache.set_multiple(&records, &ttl_by_key).await });
        match writes.await {
            Ok(()) => debug!("Stored {} fresh results", count),
            Err(e) => warn!("Cache write task failed: {}", e),
        }
    }

    /// One call for every keyword. `None` means the whole batch must be fetched individually.
    async fn fetch_batch(&self, requests: &[KeywordRequest]) -> Option<Vec<Vec<Topic>>> {
        let prompt = batch_prompt(requests);
        let timeout = self.config.batch_timeout();
        info!("Fetching {} keywords in one batched call", requests.len());
        let raw = match self.call_search(&prompt, timeout).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Batch search call failed: {}", e);
                return None;
            }
        };
        self.pipeline.parse_batch(&raw, requests)
    }

    /// One concurrent call per keyword; a failure only affects its own keyword.
    async fn fetch_individual(&self, requests: &[KeywordRequest]) -> Vec<KeywordOutcome> {
        info!("Fetching {} keywords individually", requests.len());
        join_all(requests.iter().map(|request| self.fetch_one(request))).await
    }

    async fn fetch_one(&self, request: &KeywordRequest) -> KeywordOutcome {
        let prompt = keyword_prompt(request.keyword(), request.max_results());
        match self.call_search(&prompt, self.config.keyword_timeout()).await {
            Ok(raw) => {
                let topics = self
                    .pipeline
                    .parse(&raw, request.keyword(), request.max_results());
                if topics.is_empty() {
                    KeywordOutcome::Unparseable
                } else {
                    KeywordOutcome::Resolved(topics)
                }
            }
            Err(e) => KeywordOutcome::Failed(e),
        }
    }

    /// Search call bounded by `timeout` regardless of how the client honours it.
    async fn call_search(&self, prompt: &str, timeout: Duration) -> Result<String, TrendError> {
        let call = self.search.fetch(prompt, &self.config.search_model, timeout);
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TrendError::Timeout(format!(
                "no response within {}ms",
                timeout.as_millis()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKeyStore;
    use crate::config::Config;
    use crate::testing::{batch_json, ScriptedReply, ScriptedSearchClient};
    use std::sync::Arc;

    fn orchestrator(config: Config, search: Arc<ScriptedSearchClient>) -> TrendingOrchestrator {
        TrendingOrchestrator::new(Arc::new(config), Arc::new(MemoryKeyStore::new()), search)
    }

    fn requests(keywords: &[&str], max_results: usize) -> Vec<KeywordRequest> {
        keywords
            .iter()
            .map(|k| KeywordRequest::new(k, max_results, None).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn small_miss_set_uses_one_batch_call() {
        let search = Arc::new(ScriptedSearchClient::new());
        let orch = orchestrator(Config::test_default(), search.clone());
        let results = orch.fetch_and_store(&requests(&["rust", "go"], 2)).await;
        assert_eq!(search.batch_calls(), 1);
        assert_eq!(search.keyword_calls(), 0);
        assert_eq!(results[1].keyword, "go");
        assert_eq!(results[1].topics.len(), 2);
    }

    #[tokio::test]
    async fn single_miss_is_fetched_individually() {
        let search = Arc::new(ScriptedSearchClient::new());
        let orch = orchestrator(Config::test_default(), search.clone());
        orch.fetch_and_store(&requests(&["rust"], 2)).await;
        assert_eq!((search.batch_calls(), search.keyword_calls()), (0, 1));
    }

    #[tokio::test]
    async fn invalid_batch_element_costs_one_plus_n_calls() {
        let raw = r#"[{"keyword":"rust","topics":[{"title":"Rust headline one","summary":"A summary long enough to pass."}]},{"keyword":"go"}]"#;
        let search =
            Arc::new(ScriptedSearchClient::new().with_batch(ScriptedReply::Text(raw.to_string())));
        let orch = orchestrator(Config::test_default(), search.clone());
        let results = orch.fetch_and_store(&requests(&["rust", "go", "zig"], 2)).await;
        assert_eq!(search.batch_calls(), 1);
        assert_eq!(search.keyword_calls(), 3);
        assert!(results.iter().all(|r| r.topics.len() == 2));
    }

    #[tokio::test]
    async fn batch_timeout_falls_back_to_individual() {
        let search = Arc::new(ScriptedSearchClient::new().with_batch(ScriptedReply::Hang));
        let mut config = Config::test_default();
        config.batch_timeout_ms = 50;
        let orch = orchestrator(config, search.clone());
        let results = orch.fetch_and_store(&requests(&["rust", "go"], 1)).await;
        assert_eq!(search.keyword_calls(), 2);
        assert_eq!(results[0].topics.len(), 1);
    }

    #[tokio::test]
    async fn batch_with_reordered_elements_maps_by_keyword() {
        let raw = batch_json(&[("go", 2), ("rust", 2)]);
        let search = Arc::new(ScriptedSearchClient::new().with_batch(ScriptedReply::Text(raw)));
        let orch = orchestrator(Config::test_default(), search.clone());
        let results = orch.fetch_and_store(&requests(&["rust", "go"], 2)).await;
        assert!(results[0].topics[0].title.starts_with("rust"));
        assert!(results[1].topics[0].title.starts_with("go"));
        assert_eq!(search.keyword_calls(), 0);
    }

    #[tokio::test]
    async fn slow_keyword_does_not_delay_siblings() {
        let search = Arc::new(
            ScriptedSearchClient::new()
                .with_keyword("slow", ScriptedReply::Hang)
                .with_keyword(
                    "late",
                    ScriptedReply::Delayed(
                        Duration::from_millis(20),
                        crate::testing::topics_json("late", 1),
                    ),
                ),
        );
        let mut config = Config::test_default();
        config.keyword_timeout_ms = 200;
        config.batch_max_keywords = 1;
        let orch = orchestrator(config, search.clone());

        let started = std::time::Instant::now();
        let results = orch
            .fetch_and_store(&requests(&["slow", "late", "fast"], 1))
            .await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(results[0].topics, vec![unavailable_topic("slow")]);
        assert_eq!(results[1].topics[0].title, "late headline 1");
        assert_eq!(results[2].topics.len(), 1);

        // only the two resolved keywords were cached
        assert_eq!(orch.cache_info().await.len(), 2);
    }
}
