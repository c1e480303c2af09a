//! Test doubles for the two collaborators the orchestrator talks to.
//!
//! - `ScriptedSearchClient`: a search provider whose answers are scripted per keyword, with a
//!   healthy default that returns well-formed topics for whatever was asked.
//! - `FailingKeyStore`: a cache backend that is permanently down.

use crate::cache::{KeyStore, KeyTtl};
use crate::error::{Result, TrendError};
use crate::search::prompts::is_batch_prompt;
use crate::search::SearchClient;
use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

static KEYWORD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^- "(.+)": (\d+) topics$"#).expect("batch line regex"));
static SINGLE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"the (\d+) most recent trending news topics about "(.+)"\."#)
        .expect("keyword prompt regex")
});

/// How the scripted provider answers one call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this text verbatim.
    Text(String),
    /// Return this error.
    Fail(TrendError),
    /// Never answer; the caller's timeout has to fire.
    Hang,
    /// Answer with `text` after `delay`.
    Delayed(Duration, String),
}

/// JSON array of `count` valid topics for `keyword`.
pub fn topics_json(keyword: &str, count: usize) -> String {
    json!((1..=count)
        .map(|i| json!({
            "title": format!("{} headline {}", keyword, i),
            "summary": format!("Summary number {} describing news about {}.", i, keyword),
            "url": format!("https://news.example/{}", i),
        }))
        .collect::<Vec<_>>())
    .to_string()
}

/// Batch-shaped JSON answer covering every `(keyword, count)` pair.
pub fn batch_json(wanted: &[(&str, usize)]) -> String {
    let elements: Vec<serde_json::Value> = wanted
        .iter()
        .map(|(keyword, count)| {
            let topics: serde_json::Value =
                serde_json::from_str(&topics_json(keyword, *count)).unwrap_or_default();
            json!({ "keyword": keyword, "topics": topics })
        })
        .collect();
    serde_json::Value::Array(elements).to_string()
}

#[derive(Debug, Default)]
pub struct ScriptedSearchClient {
    keyword_replies: Mutex<HashMap<String, ScriptedReply>>,
    batch_reply: Mutex<Option<ScriptedReply>>,
    prompts: Mutex<Vec<String>>,
    keyword_calls: AtomicUsize,
    batch_calls: AtomicUsize,
}

impl ScriptedSearchClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripted answer for individual calls about `keyword` (case-insensitive).
    pub fn with_keyword(self, keyword: &str, reply: ScriptedReply) -> Self {
        if let Ok(mut replies) = self.keyword_replies.lock() {
            replies.insert(keyword.to_lowercase(), reply);
        }
        self
    }

    /// Scripted answer for every batched call.
    pub fn with_batch(self, reply: ScriptedReply) -> Self {
        if let Ok(mut batch) = self.batch_reply.lock() {
            *batch = Some(reply);
        }
        self
    }

    pub fn call_count(&self) -> usize {
        self.keyword_calls() + self.batch_calls()
    }

    pub fn keyword_calls(&self) -> usize {
        self.keyword_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Every prompt received, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn reply_for(&self, prompt: &str) -> ScriptedReply {
        if is_batch_prompt(prompt) {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            let scripted = self.batch_reply.lock().ok().and_then(|b| b.clone());
            return scripted.unwrap_or_else(|| {
                let wanted: Vec<(String, usize)> = KEYWORD_LINE
                    .captures_iter(prompt)
                    .map(|caps| (caps[1].to_string(), caps[2].parse().unwrap_or(1)))
                    .collect();
                let pairs: Vec<(&str, usize)> =
                    wanted.iter().map(|(k, n)| (k.as_str(), *n)).collect();
                ScriptedReply::Text(batch_json(&pairs))
            });
        }

        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        let Some(caps) = SINGLE_KEYWORD.captures(prompt) else {
            return ScriptedReply::Fail(TrendError::ProviderError(
                "unrecognised prompt".to_string(),
            ));
        };
        let count: usize = caps[1].parse().unwrap_or(1);
        let keyword = caps[2].to_string();
        let scripted = self
            .keyword_replies
            .lock()
            .ok()
            .and_then(|r| r.get(&keyword.to_lowercase()).cloned());
        scripted.unwrap_or_else(|| ScriptedReply::Text(topics_json(&keyword, count)))
    }
}

#[async_trait]
impl SearchClient for ScriptedSearchClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self, prompt: &str, _model: &str, _timeout: Duration) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        match self.reply_for(prompt) {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Fail(err) => Err(err),
            ScriptedReply::Hang => {
                debug!("Scripted search call hanging until cancelled");
                std::future::pending::<()>().await;
                Ok(String::new())
            }
            ScriptedReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        }
    }
}

/// Cache backend that fails every operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingKeyStore;

impl FailingKeyStore {
    fn unavailable<T>() -> Result<T> {
        Err(TrendError::CacheError("backend unavailable".to_string()))
    }
}

#[async_trait]
impl KeyStore for FailingKeyStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn get_raw(&self, _key: &str) -> Result<Option<String>> {
        Self::unavailable()
    }

    async fn set_raw(&self, _key: &str, _value: String, _ttl_secs: u64) -> Result<()> {
        Self::unavailable()
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Self::unavailable()
    }

    async fn clear(&self, _prefix: &str) -> Result<usize> {
        Self::unavailable()
    }

    async fn ttl_listing(&self, _prefix: &str) -> Result<Vec<KeyTtl>> {
        Self::unavailable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::prompts::{batch_prompt, keyword_prompt};
    use crate::types::KeywordRequest;

    #[tokio::test]
    async fn default_replies_follow_the_prompt() {
        let client = ScriptedSearchClient::new();
        let single = client
            .fetch(&keyword_prompt("rust", 2), "m", Duration::from_secs(1))
            .await
            .unwrap();
        let items: Vec<serde_json::Value> = serde_json::from_str(&single).unwrap();
        assert_eq!(items.len(), 2);

        let requests = vec![
            KeywordRequest::new("rust", 1, None).unwrap(),
            KeywordRequest::new("go lang", 3, None).unwrap(),
        ];
        let batch = client
            .fetch(&batch_prompt(&requests), "m", Duration::from_secs(1))
            .await
            .unwrap();
        let elements: Vec<serde_json::Value> = serde_json::from_str(&batch).unwrap();
        assert_eq!(elements[1]["keyword"], "go lang");
        assert_eq!(elements[1]["topics"].as_array().unwrap().len(), 3);

        assert_eq!(client.keyword_calls(), 1);
        assert_eq!(client.batch_calls(), 1);
        assert_eq!(client.prompts().len(), 2);
    }

    #[tokio::test]
    async fn scripted_failures_are_returned() {
        let client = ScriptedSearchClient::new().with_keyword(
            "Rust",
            ScriptedReply::Fail(TrendError::ProviderError("503".into())),
        );
        let err = client
            .fetch(&keyword_prompt("rust", 2), "m", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TrendError::ProviderError(_)));
    }

    #[tokio::test]
    async fn failing_store_fails_everything() {
        let store = FailingKeyStore;
        assert!(store.get_raw("k").await.is_err());
        assert!(store.set_raw("k", "v".into(), 1).await.is_err());
        assert!(store.clear("p").await.is_err());
    }
}
