//! JSON-shaped strategies: array extraction, truncation repair and corrupted-string salvage.

use super::RawTopic;
use crate::utils::strip_code_fences;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// Ordered shapes tried against the raw text. Capture group 1, when present, is the candidate.
static ARRAY_SHAPES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("bare array", r"(?s)\[\s*\{.*\}\s*\]"),
        ("json fence", r"(?s)```(?:json|JSON)\s*(.*?)(?:```|$)"),
        ("generic fence", r"(?s)```[A-Za-z]*\s*(.*?)(?:```|$)"),
        (
            "marker",
            r"(?is)(?:json\s+array\s*:|here\s+are|topics)[^\[]*(\[.*)",
        ),
        ("open array", r"(?s)(\[\s*\{.*)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("array shape regex")))
    .collect()
});

static TRAILING_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static KEY_VALUE_SPACING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""\s*:\s*""#).expect("key spacing regex"));
static TITLE_OBJECT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\{\s*"title""#).expect("title start regex"));

static SALVAGE_SINGLE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"\{\s*"title"\s*:\s*"((?:[^"\\\n]|\\.)*)"\s*,\s*"summary"\s*:\s*"((?:[^"\\\n]|\\.)*)"[^{}]*\}"#,
    )
    .expect("single-line salvage regex")
});
static SALVAGE_MULTI_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)\{\s*"title"\s*:\s*"([^{}]*?)"\s*,\s*"summary"\s*:\s*"([^{}]*?)"\s*[,}]"#)
        .expect("multi-line salvage regex")
});

/// One array-shaped slice of the model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub shape: &'static str,
    pub raw: String,
    pub cleaned: String,
}

/// Every distinct array-shaped substring, in shape order.
pub fn extract_candidates(text: &str) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for (shape, regex) in ARRAY_SHAPES.iter() {
        let Some(captures) = regex.captures(text) else {
            continue;
        };
        let Some(matched) = captures.get(1).or_else(|| captures.get(0)) else {
            continue;
        };
        let raw = matched.as_str();
        if !raw.contains('{') {
            continue;
        }
        let cleaned = clean_candidate(raw);
        if cleaned.is_empty() || !seen.insert(cleaned.clone()) {
            continue;
        }
        candidates.push(Candidate {
            shape,
            raw: raw.to_string(),
            cleaned,
        });
    }
    candidates
}

/// Strip fences, drop trailing commas, collapse whitespace and normalise `"k" : "v"`.
pub fn clean_candidate(raw: &str) -> String {
    let unfenced = strip_code_fences(raw);
    let from_array = match unfenced.find('[') {
        Some(idx) => &unfenced[idx..],
        None => unfenced.as_str(),
    };
    let collapsed = WHITESPACE.replace_all(from_array, " ");
    let no_trailing = TRAILING_COMMA.replace_all(&collapsed, "$1");
    KEY_VALUE_SPACING
        .replace_all(&no_trailing, "\":\"")
        .trim()
        .to_string()
}

/// Deserializes the first JSON value in `text` (trailing prose is ignored) into array items.
/// `{"topics": [...]}` wrappers are unwrapped.
pub fn deserialize_items(text: &str) -> Result<Vec<Value>, serde_json::Error> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    let value = match stream.next() {
        Some(value) => value?,
        None => return Err(serde::de::Error::custom("no JSON value in candidate")),
    };
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("topics") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(serde::de::Error::custom("object without a topics array")),
        },
        _ => Err(serde::de::Error::custom("candidate is not an array")),
    }
}

fn raw_topics(items: &[Value]) -> Vec<RawTopic> {
    items.iter().filter_map(RawTopic::from_value).collect()
}

/// Strategy 1: the cleaned candidate deserializes as an array of topic objects.
pub fn direct_array(candidate: &Candidate) -> Option<Vec<RawTopic>> {
    match deserialize_items(&candidate.cleaned) {
        Ok(items) => Some(raw_topics(&items)),
        Err(e) => {
            debug!("Direct parse of {} candidate failed: {}", candidate.shape, e);
            None
        }
    }
}

/// Heuristic: the candidate ends mid-value, never closes its array, or has unbalanced braces.
pub fn looks_truncated(text: &str) -> bool {
    let trimmed = text.trim_end();
    let ends_mid_string = trimmed.ends_with('"') && !trimmed.ends_with("\\\"");
    let never_closes = TITLE_OBJECT_START.is_match(trimmed) && !trimmed.ends_with(']');
    let unbalanced = trimmed.matches('{').count() > trimmed.matches('}').count();
    ends_mid_string || never_closes || unbalanced
}

/// Byte spans of every balanced `{...}` in `text`, skipping braces inside strings.
/// Inner objects are reported before the object that contains them.
fn balanced_object_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for (idx, byte) in text.bytes().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => open.push(idx),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, idx + 1));
                }
            }
            _ => {}
        }
    }
    spans
}

fn is_topic_object(value: &Value) -> bool {
    value.get("title").map_or(false, Value::is_string)
        && value.get("summary").map_or(false, Value::is_string)
}

/// Every syntactically complete topic object in `text`, in order, deduplicated by title.
/// Objects nested inside an accepted topic are part of it, not topics of their own.
pub fn harvest_complete_objects(text: &str) -> Vec<Value> {
    let mut found: Vec<(usize, usize, Value)> = balanced_object_spans(text)
        .into_iter()
        .filter_map(|(start, end)| {
            serde_json::from_str::<Value>(&text[start..end])
                .ok()
                .filter(is_topic_object)
                .map(|value| (start, end, value))
        })
        .collect();
    found.sort_by_key(|(start, _, _)| *start);

    let mut outer_end = 0;
    let mut titles = HashSet::new();
    let mut harvested = Vec::new();
    for (start, end, value) in found {
        if start < outer_end {
            continue;
        }
        outer_end = end;
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .map(|t| t.trim().to_lowercase())
            .unwrap_or_default();
        if titles.insert(title) {
            harvested.push(value);
        }
    }
    harvested
}

/// Strategy 2: rebuild the array from whole objects when the candidate looks truncated.
pub fn truncation_repair(candidate: &Candidate) -> Option<Vec<RawTopic>> {
    if !looks_truncated(&candidate.cleaned) {
        return None;
    }
    let harvested = harvest_complete_objects(&candidate.cleaned);
    if harvested.is_empty() {
        return None;
    }
    debug!(
        "Truncated {} candidate: harvested {} complete objects",
        candidate.shape,
        harvested.len()
    );
    let rebuilt = serde_json::to_string(&Value::Array(harvested)).ok()?;
    deserialize_items(&rebuilt).ok().map(|items| raw_topics(&items))
}

fn unescape(s: &str) -> String {
    let unescaped = s
        .replace("\\\"", "\"")
        .replace("\\n", " ")
        .replace("\\t", " ")
        .replace("\\/", "/")
        .replace("\\\\", "\\");
    WHITESPACE.replace_all(unescaped.trim(), " ").into_owned()
}

/// Strategy 3: when deserialization hit an unterminated string, scan the uncleaned
/// candidate for title/summary pairs.
pub fn corrupted_salvage(candidate: &Candidate) -> Option<Vec<RawTopic>> {
    match deserialize_items(&candidate.cleaned) {
        Err(e) if e.is_eof() => {}
        _ => return None,
    }

    let mut pairs: Vec<(usize, String, String)> = [&*SALVAGE_SINGLE_LINE, &*SALVAGE_MULTI_LINE]
        .into_iter()
        .flat_map(|regex| regex.captures_iter(&candidate.raw))
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            Some((start, unescape(caps.get(1)?.as_str()), unescape(caps.get(2)?.as_str())))
        })
        .collect();
    pairs.sort_by_key(|(start, _, _)| *start);

    let mut titles = HashSet::new();
    let salvaged: Vec<RawTopic> = pairs
        .into_iter()
        .filter(|(_, title, _)| titles.insert(title.to_lowercase()))
        .map(|(_, title, summary)| RawTopic {
            title,
            summary,
            source_url: None,
        })
        .collect();
    if salvaged.is_empty() {
        None
    } else {
        debug!(
            "Salvaged {} objects from corrupted {} candidate",
            salvaged.len(),
            candidate.shape
        );
        Some(salvaged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_array_is_first_candidate() {
        let text = r#"Sure! [{"title":"One title here","summary":"First summary text."}] Thanks"#;
        let candidates = extract_candidates(text);
        assert_eq!(candidates[0].shape, "bare array");
        assert!(candidates[0].cleaned.starts_with('['));
        assert!(candidates[0].cleaned.ends_with(']'));
    }

    #[test]
    fn fenced_block_is_extracted() {
        let text = "Here you go:\n```json\n[\n  {\"title\": \"Fenced title\", \"summary\": \"Inside a code fence.\"},\n]\n```\n";
        let candidates = extract_candidates(text);
        let topics = candidates.iter().find_map(direct_array).unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].title, "Fenced title");
    }

    #[test]
    fn prose_without_braces_has_no_candidates() {
        assert!(extract_candidates("Nothing to see [1] here, topics are quiet.").is_empty());
    }

    #[test]
    fn cleanup_fixes_common_defects() {
        let cleaned = clean_candidate("```json\n[{\"title\" : \"A\",\n \"summary\" : \"B\",},]\n```");
        assert_eq!(cleaned, r#"[{"title":"A", "summary":"B"}]"#);
    }

    #[test]
    fn wrapped_topics_object_is_unwrapped() {
        let items = deserialize_items(r#"{"topics":[{"title":"t","summary":"s"}]}"#).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn trailing_prose_after_array_is_ignored() {
        let items = deserialize_items(r#"[{"title":"t","summary":"s"}] and more text"#).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn truncation_heuristics() {
        assert!(looks_truncated(r#"[{"title":"a","summary":"b"},{"title":"c"#));
        assert!(looks_truncated(r#"[{"title":"a","summary":"b"}, {"title":"c","summary":""#));
        assert!(looks_truncated(r#"[{"title":"a","summary":"b"}"#));
        assert!(!looks_truncated(r#"[{"title":"a","summary":"b"}]"#));
    }

    #[test]
    fn harvest_keeps_only_complete_objects() {
        let text = r#"[{"title":"First complete one","summary":"The first summary is complete.","url":"https://a.example"},{"summary":"Reversed field order works.","title":"Second complete one"},{"title":"Third is cut off","summary":"This summary never ends"#;
        let harvested = harvest_complete_objects(text);
        let titles: Vec<&str> = harvested
            .iter()
            .map(|v| v["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["First complete one", "Second complete one"]);
    }

    #[test]
    fn harvest_keeps_objects_with_nested_fields() {
        let text = r#"[{"title":"First complete story","summary":"Carries a list of tags.","tags":["a","b"]},{"title":"Second complete story","summary":"Carries a nested source.","source":{"name":"Wire {desk}","url":"https://b.example"}},{"title":"Third cut off","summ"#;
        let titles: Vec<String> = harvest_complete_objects(text)
            .iter()
            .map(|v| v["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["First complete story", "Second complete story"]);
    }

    #[test]
    fn truncated_array_with_nested_fields_is_fully_repaired() {
        let text = r#"[{"title":"First complete story","summary":"Carries a list of tags.","tags":["a","b"]},{"title":"Second complete story","summary":"Carries a nested source.","source":{"name":"Wire","url":"https://b.example"}},{"title":"Third cut off","summ"#;
        let candidate = Candidate {
            shape: "test",
            raw: text.to_string(),
            cleaned: clean_candidate(text),
        };
        let repaired = truncation_repair(&candidate).unwrap();
        assert_eq!(repaired.len(), 2);
        assert_eq!(repaired[0].title, "First complete story");
        assert_eq!(repaired[1].title, "Second complete story");
    }

    #[test]
    fn harvest_deduplicates_titles() {
        let text = r#"{"title":"Same","summary":"one"},{"title":"same","summary":"two"}"#;
        assert_eq!(harvest_complete_objects(text).len(), 1);
    }

    #[test]
    fn salvage_requires_eof_error() {
        let complete = Candidate {
            shape: "test",
            raw: r#"[{"title":"x","summary":"y"} oops]"#.to_string(),
            cleaned: r#"[{"title":"x","summary":"y"} oops]"#.to_string(),
        };
        assert_eq!(corrupted_salvage(&complete), None);
    }

    #[test]
    fn salvage_unescapes_and_spans_lines() {
        let raw = "[{\"title\": \"Quoted \\\"word\\\" headline\", \"summary\": \"Single line summary here.\"},\n{\"title\": \"Multi line\nheadline\", \"summary\": \"Summary split\nacross lines.\"},\n{\"title\": \"Never finished";
        let candidate = Candidate {
            shape: "test",
            raw: raw.to_string(),
            cleaned: clean_candidate(raw),
        };
        let salvaged = corrupted_salvage(&candidate).unwrap();
        assert_eq!(salvaged.len(), 2);
        assert_eq!(salvaged[0].title, "Quoted \"word\" headline");
        assert_eq!(salvaged[1].title, "Multi line headline");
        assert_eq!(salvaged[1].summary, "Summary split across lines.");
    }
}
