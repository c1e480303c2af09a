// src/repair/mod.rs
//! Turns free-form model output into validated topics.
//!
//! Strategies run in a fixed order and the first one that yields at least one valid topic
//! wins. The JSON-shaped strategies are tried against each array-shaped candidate in turn;
//! the prose strategies only run when the text contains no JSON-shaped content at all.

pub mod json;
pub mod text;

use crate::types::{KeywordRequest, Topic};
use crate::utils::search_url;
use json::Candidate;
use log::{debug, info, warn};
use serde_json::Value;

pub const MIN_TITLE_CHARS: usize = 5;
pub const MIN_SUMMARY_CHARS: usize = 10;

/// Fields we accept as a topic's source link, in preference order.
const SOURCE_FIELDS: &[&str] = &["sourceUrl", "url", "source_url", "source"];

/// A title/summary pair before validation and search-link derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTopic {
    pub title: String,
    pub summary: String,
    pub source_url: Option<String>,
}

impl RawTopic {
    /// `None` unless both `title` and `summary` are strings.
    pub fn from_value(value: &Value) -> Option<Self> {
        let title = value.get("title")?.as_str()?.to_string();
        let summary = value.get("summary")?.as_str()?.to_string();
        let source_url = SOURCE_FIELDS
            .iter()
            .filter_map(|field| value.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|url| url.starts_with("http"))
            .map(str::to_string);
        Some(Self {
            title,
            summary,
            source_url,
        })
    }
}

fn clean_title(title: &str) -> &str {
    title.trim().trim_matches('*').trim()
}

/// Minimum-length check applied to every topic, whichever strategy produced it.
pub fn is_valid_pair(title: &str, summary: &str) -> bool {
    clean_title(title).chars().count() > MIN_TITLE_CHARS
        && summary.trim().chars().count() > MIN_SUMMARY_CHARS
}

/// Validates, derives `searchUrl` and truncates to `max_results`.
pub fn finalize(raw: Vec<RawTopic>, keyword: &str, max_results: usize) -> Vec<Topic> {
    raw.into_iter()
        .filter(|t| is_valid_pair(&t.title, &t.summary))
        .take(max_results)
        .map(|t| {
            let title = clean_title(&t.title).to_string();
            Topic {
                search_url: search_url(keyword, Some(&title)),
                summary: t.summary.trim().to_string(),
                source_url: t.source_url,
                title,
            }
        })
        .collect()
}

/// Single topic used when a response arrived but nothing in it could be parsed.
pub fn fallback_topic(keyword: &str) -> Topic {
    Topic {
        title: format!("Search completed for \"{}\"", keyword),
        summary: "Search results were found but could not be parsed into topics. \
                  Open the search link to browse them directly."
            .to_string(),
        search_url: search_url(keyword, None),
        source_url: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    DirectArray,
    TruncationRepair,
    CorruptedSalvage,
    StructuredText,
    SentenceMining,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::DirectArray,
        Strategy::TruncationRepair,
        Strategy::CorruptedSalvage,
        Strategy::StructuredText,
        Strategy::SentenceMining,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::DirectArray => "direct_array",
            Strategy::TruncationRepair => "truncation_repair",
            Strategy::CorruptedSalvage => "corrupted_salvage",
            Strategy::StructuredText => "structured_text",
            Strategy::SentenceMining => "sentence_mining",
        }
    }

    /// Whether the strategy works on an extracted array candidate rather than the whole text.
    pub fn is_json(&self) -> bool {
        matches!(
            self,
            Strategy::DirectArray | Strategy::TruncationRepair | Strategy::CorruptedSalvage
        )
    }

    fn apply_to_candidate(&self, candidate: &Candidate) -> Option<Vec<RawTopic>> {
        match self {
            Strategy::DirectArray => json::direct_array(candidate),
            Strategy::TruncationRepair => json::truncation_repair(candidate),
            Strategy::CorruptedSalvage => json::corrupted_salvage(candidate),
            Strategy::StructuredText | Strategy::SentenceMining => None,
        }
    }

    fn apply_to_text(&self, text: &str, max_results: usize) -> Option<Vec<RawTopic>> {
        match self {
            Strategy::StructuredText => text::structured_text(text, max_results),
            Strategy::SentenceMining => text::sentence_mining(text, max_results),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseRepairPipeline {
    strategies: Vec<Strategy>,
}

impl Default for ResponseRepairPipeline {
    fn default() -> Self {
        Self {
            strategies: Strategy::ALL.to_vec(),
        }
    }
}

impl ResponseRepairPipeline {
    /// Pipeline restricted to `strategies`, still tried in the order given.
    pub fn with_strategies(strategies: Vec<Strategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// Validated topics for `keyword`, or an empty list when every strategy fails.
    pub fn parse(&self, raw: &str, keyword: &str, max_results: usize) -> Vec<Topic> {
        match self.parse_traced(raw, keyword, max_results) {
            Some((strategy, topics)) => {
                debug!(
                    "Parsed {} topics for '{}' via {}",
                    topics.len(),
                    keyword,
                    strategy.name()
                );
                topics
            }
            None => {
                warn!("Every repair strategy failed for '{}'", keyword);
                Vec::new()
            }
        }
    }

    /// Like `parse`, also reporting which strategy produced the topics.
    pub fn parse_traced(
        &self,
        raw: &str,
        keyword: &str,
        max_results: usize,
    ) -> Option<(Strategy, Vec<Topic>)> {
        if raw.trim().is_empty() || max_results == 0 {
            return None;
        }

        let candidates = json::extract_candidates(raw);
        let json_strategies: Vec<Strategy> =
            self.strategies.iter().copied().filter(Strategy::is_json).collect();

        for candidate in &candidates {
            for strategy in &json_strategies {
                if let Some(found) = strategy.apply_to_candidate(candidate) {
                    let topics = finalize(found, keyword, max_results);
                    if !topics.is_empty() {
                        return Some((*strategy, topics));
                    }
                }
            }
        }

        if !candidates.is_empty() {
            debug!(
                "{} JSON candidates for '{}' yielded nothing valid",
                candidates.len(),
                keyword
            );
            return None;
        }

        self.strategies
            .iter()
            .filter(|s| !s.is_json())
            .find_map(|strategy| {
                let found = strategy.apply_to_text(raw, max_results)?;
                let topics = finalize(found, keyword, max_results);
                (!topics.is_empty()).then_some((*strategy, topics))
            })
    }

    /// Splits a batch response shaped `[{keyword, topics: [...]}]` into per-request topics,
    /// in request order.
    ///
    /// Returns `None` when the array does not parse, any element lacks `keyword`/`topics`,
    /// or a requested keyword has no element with at least one valid topic. Callers fall
    /// back to individual fetches for the whole batch in that case.
    pub fn parse_batch(&self, raw: &str, requests: &[KeywordRequest]) -> Option<Vec<Vec<Topic>>> {
        let items = json::extract_candidates(raw)
            .iter()
            .find_map(|candidate| json::deserialize_items(&candidate.cleaned).ok())?;

        let mut groups: Vec<(String, &Vec<Value>)> = Vec::with_capacity(items.len());
        for item in &items {
            let keyword = item.get("keyword").and_then(Value::as_str);
            let topics = item.get("topics").and_then(Value::as_array);
            match (keyword, topics) {
                (Some(keyword), Some(topics)) => {
                    groups.push((keyword.trim().to_lowercase(), topics))
                }
                _ => {
                    warn!("Batch element without keyword/topics, discarding batch");
                    return None;
                }
            }
        }

        let mut resolved = Vec::with_capacity(requests.len());
        for request in requests {
            let wanted = request.keyword().to_lowercase();
            let Some((_, values)) = groups.iter().find(|(keyword, _)| *keyword == wanted) else {
                warn!("Batch response missing keyword '{}'", request.keyword());
                return None;
            };
            let raw_topics: Vec<RawTopic> = values.iter().filter_map(RawTopic::from_value).collect();
            let topics = finalize(raw_topics, request.keyword(), request.max_results());
            if topics.is_empty() {
                warn!("Batch response has no valid topics for '{}'", request.keyword());
                return None;
            }
            resolved.push(topics);
        }
        info!("Batch response resolved {} keywords", resolved.len());
        Some(resolved)
    }
}
