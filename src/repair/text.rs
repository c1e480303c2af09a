//! Prose strategies for responses that contain no JSON at all.

use super::{is_valid_pair, RawTopic};
use crate::utils::truncate_chars;
use once_cell::sync::Lazy;
use regex::Regex;

static LIST_ITEM_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\d{1,2}[.)]\s|[-*•]\s|\*\*|#{1,6}\s)").expect("list item regex")
});
static NUMBERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\s*\d{1,2}[.)]\s+(.+)$").expect("numbered item regex"));
static BOLD_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*(?:[-*•]\s+)?\*\*(.+?)\*\*\s*[:\-–—]?\s*(.+)$").expect("bold title regex")
});
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

const META_PHRASES: &[&str] = &["here are", "trending topics", "json array"];
const CLAUSE_BREAKS: &[&str] = &[": ", "; ", ", ", " - ", " – ", " — "];

const TWO_LINE_TITLE_CHARS: (usize, usize) = (10, 150);
const TWO_LINE_SUMMARY_CHARS: (usize, usize) = (20, 500);
const SENTENCE_CHARS: (usize, usize) = (30, 400);
const MAX_MINED_TITLE_CHARS: usize = 100;

fn collapse(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

fn strip_markdown(s: &str) -> String {
    collapse(&s.replace("**", "").replace('`', ""))
        .trim_start_matches(|c: char| c == '#' || c == '-' || c == '*' || c == '•' || c.is_whitespace())
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn within(len: usize, (min, max): (usize, usize)) -> bool {
    len >= min && len <= max
}

/// Paragraph-like segments: split on blank lines and at the start of each list item.
pub fn split_segments(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let starts_item = LIST_ITEM_START.is_match(line);
        if line.trim().is_empty() || (starts_item && !current.is_empty()) {
            if !current.is_empty() {
                segments.push(current.join("\n"));
                current.clear();
            }
            if line.trim().is_empty() {
                continue;
            }
        }
        current.push(line);
    }
    if !current.is_empty() {
        segments.push(current.join("\n"));
    }
    segments
}

/// `Title - Summary`, `Title: Summary`, or `**Title** Summary` inside a list item body.
fn split_title_summary(body: &str) -> Option<(String, String)> {
    if let Some(caps) = BOLD_TITLE.captures(body) {
        return Some((strip_markdown(&caps[1]), collapse(&caps[2])));
    }
    let first_line = body.lines().next().unwrap_or(body);
    let (idx, sep) = [" - ", " – ", " — ", ": "]
        .iter()
        .filter_map(|sep| first_line.find(sep).map(|idx| (idx, *sep)))
        .min_by_key(|(idx, _)| *idx)?;
    let title = strip_markdown(&body[..idx]);
    let summary = collapse(&body[idx + sep.len()..]);
    Some((title, summary))
}

fn numbered_item(segment: &str) -> Option<(String, String)> {
    let caps = NUMBERED.captures(segment)?;
    split_title_summary(&caps[1])
}

fn bold_item(segment: &str) -> Option<(String, String)> {
    let caps = BOLD_TITLE.captures(segment)?;
    Some((strip_markdown(&caps[1]), collapse(&caps[2])))
}

fn two_line_item(segment: &str) -> Option<(String, String)> {
    let mut lines = segment.lines();
    let title = strip_markdown(lines.next()?);
    let summary = collapse(&lines.collect::<Vec<_>>().join(" "));
    if within(title.chars().count(), TWO_LINE_TITLE_CHARS)
        && within(summary.chars().count(), TWO_LINE_SUMMARY_CHARS)
    {
        Some((title, summary))
    } else {
        None
    }
}

/// Strategy 4: numbered list, then bold title, then two-line title/summary per segment.
pub fn structured_text(text: &str, max_results: usize) -> Option<Vec<RawTopic>> {
    let mut topics = Vec::new();
    for segment in split_segments(text) {
        if topics.len() >= max_results {
            break;
        }
        let pair = numbered_item(&segment)
            .or_else(|| bold_item(&segment))
            .or_else(|| two_line_item(&segment));
        if let Some((title, summary)) = pair {
            if is_valid_pair(&title, &summary) {
                topics.push(RawTopic {
                    title,
                    summary,
                    source_url: None,
                });
            }
        }
    }
    if topics.is_empty() {
        None
    } else {
        Some(topics)
    }
}

/// Sentences ending in `.`, `!` or `?` followed by whitespace or end of text.
pub fn split_sentences(text: &str) -> Vec<String> {
    let flat = collapse(&text.replace("**", "").replace('`', ""));
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = flat.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if at_boundary {
            let end = idx + c.len_utf8();
            sentences.push(flat[start..end].trim().to_string());
            start = end;
        }
    }
    let rest = flat[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

fn is_meta(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    META_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Title from a sentence: first clause, at most 100 characters, no trailing punctuation.
fn first_clause(sentence: &str) -> String {
    let cut = CLAUSE_BREAKS
        .iter()
        .filter_map(|brk| sentence.find(brk))
        .min()
        .unwrap_or(sentence.len());
    let clause = sentence[..cut].trim_start_matches(|c: char| c == '#' || c == '-' || c.is_whitespace());
    truncate_chars(clause, MAX_MINED_TITLE_CHARS)
        .trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string()
}

/// Strategy 5: pair consecutive qualifying sentences as (title, summary).
pub fn sentence_mining(text: &str, max_results: usize) -> Option<Vec<RawTopic>> {
    let sentences: Vec<String> = split_sentences(text)
        .into_iter()
        .filter(|s| within(s.chars().count(), SENTENCE_CHARS))
        .filter(|s| !is_meta(s))
        .collect();

    let topics: Vec<RawTopic> = sentences
        .chunks_exact(2)
        .filter_map(|pair| {
            let title = first_clause(&pair[0]);
            let summary = pair[1].clone();
            is_valid_pair(&title, &summary).then_some(RawTopic {
                title,
                summary,
                source_url: None,
            })
        })
        .take(max_results)
        .collect();

    if topics.is_empty() {
        None
    } else {
        Some(topics)
    }
}
