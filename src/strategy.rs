// src/strategy.rs
// Decides between one batched search call and one call per keyword.
// Larger expected payloads are more likely to come back truncated, so the decision is
// driven by predicted response size rather than keyword content.

use crate::config::Config;
use crate::types::KeywordRequest;
use log::debug;

pub const DEFAULT_MAX_TOTAL_TOPICS: usize = 12;
pub const DEFAULT_MAX_ESTIMATED_TOKENS: usize = 2000;
pub const DEFAULT_MAX_KEYWORDS: usize = 3;
pub const DEFAULT_TOKENS_PER_TOPIC: usize = 100;

/// Predicted size of a batched response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchEstimate {
    pub keywords: usize,
    pub total_topics: usize,
    pub estimated_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchStrategySelector {
    pub max_total_topics: usize,
    pub max_estimated_tokens: usize,
    pub max_keywords: usize,
    pub tokens_per_topic: usize,
}

impl Default for FetchStrategySelector {
    fn default() -> Self {
        Self {
            max_total_topics: DEFAULT_MAX_TOTAL_TOPICS,
            max_estimated_tokens: DEFAULT_MAX_ESTIMATED_TOKENS,
            max_keywords: DEFAULT_MAX_KEYWORDS,
            tokens_per_topic: DEFAULT_TOKENS_PER_TOPIC,
        }
    }
}

impl FetchStrategySelector {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_total_topics: config.batch_max_total_topics,
            max_estimated_tokens: config.batch_max_estimated_tokens,
            max_keywords: config.batch_max_keywords,
            tokens_per_topic: config.batch_tokens_per_topic,
        }
    }

    pub fn estimate(&self, requests: &[KeywordRequest]) -> BatchEstimate {
        let total_topics: usize = requests.iter().map(KeywordRequest::max_results).sum();
        BatchEstimate {
            keywords: requests.len(),
            total_topics,
            estimated_tokens: total_topics.saturating_mul(self.tokens_per_topic),
        }
    }

    /// `true` when a single batched call is expected to come back intact.
    pub fn should_batch(&self, requests: &[KeywordRequest]) -> bool {
        let estimate = self.estimate(requests);
        let batch = estimate.total_topics <= self.max_total_topics
            && estimate.estimated_tokens <= self.max_estimated_tokens
            && estimate.keywords <= self.max_keywords;
        debug!(
            "Strategy for {} keywords: {} topics, ~{} tokens -> {}",
            estimate.keywords,
            estimate.total_topics,
            estimate.estimated_tokens,
            if batch { "batch" } else { "individual" }
        );
        batch
    }
}
