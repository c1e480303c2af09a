//! Data model shared by the cache, repair pipeline and orchestrator.

use crate::error::TrendError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest keyword accepted after trimming, in characters.
pub const MAX_KEYWORD_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RetentionUnit {
    Hour,
    Day,
}

/// A user's requested cache validity window for one keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    pub value: i64,
    pub unit: RetentionUnit,
}

impl Retention {
    pub fn hours(value: i64) -> Self {
        Self {
            value,
            unit: RetentionUnit::Hour,
        }
    }

    pub fn days(value: i64) -> Self {
        Self {
            value,
            unit: RetentionUnit::Day,
        }
    }
}

impl fmt::Display for Retention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            RetentionUnit::Hour => write!(f, "{}h", self.value),
            RetentionUnit::Day => write!(f, "{}d", self.value),
        }
    }
}

/// Accepts `6h`, `2d`, `12 hours`, `1 day`.
impl FromStr for Retention {
    type Err = TrendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_ascii_lowercase();
        let split_at = trimmed
            .find(|c: char| !c.is_ascii_digit() && c != '-')
            .ok_or_else(|| TrendError::InvalidRetention(format!("missing unit in '{}'", s)))?;
        let (number, unit) = trimmed.split_at(split_at);
        let value: i64 = number
            .parse()
            .map_err(|_| TrendError::InvalidRetention(format!("bad number in '{}'", s)))?;
        let unit = match unit.trim() {
            "h" | "hr" | "hrs" | "hour" | "hours" => RetentionUnit::Hour,
            "d" | "day" | "days" => RetentionUnit::Day,
            other => {
                return Err(TrendError::InvalidRetention(format!(
                    "unknown unit '{}' in '{}'",
                    other, s
                )))
            }
        };
        Ok(Retention { value, unit })
    }
}

/// One keyword to resolve. Immutable once built; fields are only reachable through getters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRequest {
    keyword: String,
    max_results: usize,
    retention: Option<Retention>,
}

impl KeywordRequest {
    /// Trims the keyword and rejects empty or over-long input.
    pub fn new(
        keyword: impl AsRef<str>,
        max_results: usize,
        retention: Option<Retention>,
    ) -> Result<Self, TrendError> {
        let keyword = keyword.as_ref().trim();
        if keyword.is_empty() {
            return Err(TrendError::InvalidKeyword(
                "keyword cannot be empty".to_string(),
            ));
        }
        let chars = keyword.chars().count();
        if chars > MAX_KEYWORD_CHARS {
            return Err(TrendError::InvalidKeyword(format!(
                "keyword is {} characters long, maximum is {}",
                chars, MAX_KEYWORD_CHARS
            )));
        }
        Ok(Self {
            keyword: keyword.to_string(),
            max_results,
            retention,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn retention(&self) -> Option<Retention> {
        self.retention
    }

    /// Copy with `max_results` clamped into `[min, max]`. An inverted range resolves to `max`.
    pub fn clamped(&self, min: usize, max: usize) -> Self {
        Self {
            keyword: self.keyword.clone(),
            max_results: self.max_results.max(min).min(max),
            retention: self.retention,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub title: String,
    pub summary: String,
    pub search_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingResult {
    pub keyword: String,
    pub topics: Vec<Topic>,
    pub last_updated: DateTime<Utc>,
    pub cached: bool,
}

impl TrendingResult {
    pub fn fresh(keyword: impl Into<String>, topics: Vec<Topic>) -> Self {
        Self {
            keyword: keyword.into(),
            topics,
            last_updated: Utc::now(),
            cached: false,
        }
    }

    /// New value marked as served from cache under the caller's spelling of the keyword,
    /// keeping at most `max_results` topics.
    pub fn from_cache(&self, keyword: &str, max_results: usize) -> Self {
        Self {
            keyword: keyword.to_string(),
            topics: self.topics.iter().take(max_results).cloned().collect(),
            last_updated: self.last_updated,
            cached: true,
        }
    }
}

/// What a `KeyStore` persists for one keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    pub result: TrendingResult,
    pub expires_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn new(result: TrendingResult, ttl_secs: u64) -> Self {
        let secs = i64::try_from(ttl_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        let ttl = chrono::Duration::seconds(secs);
        let expires_at = result
            .last_updated
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self { result, expires_at }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Normalized cache key: lower-cased, whitespace runs collapsed to `_`, namespaced.
pub fn cache_key(prefix: &str, keyword: &str) -> String {
    let normalized = keyword
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    format!("{}:{}", prefix, normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_is_trimmed_and_validated() {
        let req = KeywordRequest::new("  rust lang  ", 3, None).unwrap();
        assert_eq!(req.keyword(), "rust lang");

        assert!(matches!(
            KeywordRequest::new("   ", 3, None),
            Err(TrendError::InvalidKeyword(_))
        ));
        let long = "x".repeat(MAX_KEYWORD_CHARS + 1);
        assert!(KeywordRequest::new(long, 3, None).is_err());
        let exact = "x".repeat(MAX_KEYWORD_CHARS);
        assert!(KeywordRequest::new(exact, 3, None).is_ok());
    }

    #[test]
    fn clamped_copy_respects_bounds() {
        let req = KeywordRequest::new("ai", 50, None).unwrap();
        assert_eq!(req.clamped(1, 10).max_results(), 10);
        let req = KeywordRequest::new("ai", 0, None).unwrap();
        assert_eq!(req.clamped(1, 10).max_results(), 1);
        let req = KeywordRequest::new("ai", 5, None).unwrap();
        assert_eq!(req.clamped(8, 3).max_results(), 3);
    }

    #[test]
    fn cache_key_is_normalized() {
        assert_eq!(cache_key("trending", "  Machine   Learning "), "trending:machine_learning");
        assert_eq!(cache_key("trending", "AI"), cache_key("trending", "ai"));
    }

    #[test]
    fn retention_parses_short_and_long_forms() {
        assert_eq!("6h".parse::<Retention>().unwrap(), Retention::hours(6));
        assert_eq!("2d".parse::<Retention>().unwrap(), Retention::days(2));
        assert_eq!("12 hours".parse::<Retention>().unwrap(), Retention::hours(12));
        assert!("12".parse::<Retention>().is_err());
        assert!("3w".parse::<Retention>().is_err());
    }

    #[test]
    fn record_expiry_follows_last_updated() {
        let result = TrendingResult::fresh("ai", vec![]);
        let record = CacheRecord::new(result.clone(), 60);
        assert!(record.is_live_at(result.last_updated));
        assert!(!record.is_live_at(result.last_updated + chrono::Duration::seconds(60)));
    }

    #[test]
    fn cache_hit_keeps_requested_keyword() {
        let stored = TrendingResult::fresh("go lang", vec![]);
        let served = stored.from_cache("Go Lang", 5);
        assert_eq!(served.keyword, "Go Lang");
        assert!(served.cached);
        assert_eq!(served.last_updated, stored.last_updated);
    }

    #[test]
    fn topic_serializes_camel_case() {
        let topic = Topic {
            title: "A title here".to_string(),
            summary: "A summary long enough".to_string(),
            search_url: "https://www.google.com/search?q=x".to_string(),
            source_url: None,
        };
        let json = serde_json::to_string(&topic).unwrap();
        assert!(json.contains("\"searchUrl\""));
        assert!(!json.contains("sourceUrl"));
    }
}
