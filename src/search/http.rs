// src/search/http.rs
//! `SearchClient` over an OpenAI-compatible chat-completions endpoint with web search enabled.

use super::SearchClient;
use crate::config::Config;
use crate::error::{Result, TrendError};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};

const USER_AGENT: &str = "trending-topics/0.1";
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    web_search_options: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct HttpSearchClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSearchClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpSearchClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TrendError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.search_api_url.clone(), config.search_api_key.clone())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// First choice's message content, trimmed; empty content is a provider failure.
fn extract_content(response: ChatResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        return Err(TrendError::ProviderError(
            "response contained no message content".to_string(),
        ));
    }
    Ok(content)
}

#[async_trait]
impl SearchClient for HttpSearchClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, prompt: &str, model: &str, timeout: Duration) -> Result<String> {
        let started = Instant::now();
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            web_search_options: json!({}),
        };

        let mut request = self.client.post(&self.endpoint).timeout(timeout).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("Search API returned {} for model {}", status, model);
            return Err(TrendError::ProviderError(format!(
                "search API error {}: {}",
                status,
                truncate_chars(&text, MAX_ERROR_BODY_CHARS)
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                TrendError::Timeout(e.to_string())
            } else {
                TrendError::ProviderError(format!("failed to decode search response: {}", e))
            }
        })?;
        let content = extract_content(parsed)?;
        debug!(
            "Search API answered in {}ms ({} chars)",
            started.elapsed().as_millis(),
            content.len()
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn content_comes_from_first_choice() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  [1]  "}},{"message":{"content":"second"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_content(response).unwrap(), "[1]");
    }

    #[test]
    fn missing_content_is_a_provider_error() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        let err = extract_content(response).unwrap_err();
        assert!(matches!(err, TrendError::ProviderError(_)));

        let empty: ChatResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_content(empty).is_err());
    }

    #[test]
    fn request_body_enables_web_search() {
        let body = ChatRequest {
            model: "m",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            web_search_options: json!({}),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "m");
        assert_eq!(value["messages"][0]["content"], "hi");
        assert!(value["web_search_options"].is_object());
    }

    #[test]
    fn debug_redacts_api_key() {
        let client = HttpSearchClient::new("http://localhost/v1", Some("secret".into())).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_network_error() {
        let client = HttpSearchClient::new("http://127.0.0.1:9/v1/chat/completions", None).unwrap();
        let err = client
            .fetch("prompt", "model", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err.categorize(), ErrorCategory::Network);
    }
}
