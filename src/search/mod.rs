// src/search/mod.rs
//! The web-search collaborator: one opaque text-in/text-out call per prompt.

pub mod http;
pub mod prompts;

pub use http::HttpSearchClient;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait SearchClient: Send + Sync {
    fn name(&self) -> &str;

    /// Sends `prompt` to `model` and returns the raw response text.
    ///
    /// Fails with `TrendError::Timeout` when `timeout` elapses and
    /// `TrendError::ProviderError` for any other upstream failure.
    async fn fetch(&self, prompt: &str, model: &str, timeout: Duration) -> Result<String>;
}
