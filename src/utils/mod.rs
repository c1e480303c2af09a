// src/utils/mod.rs
use log::info;
use std::str::FromStr;

pub mod timing;

/// Generic web search endpoint used for every topic's `searchUrl`.
pub const SEARCH_BASE_URL: &str = "https://www.google.com/search?q=";

pub fn setup_logging(level: Option<&str>) -> Result<(), fern::InitError> {
    let level = level
        .and_then(|l| log::LevelFilter::from_str(l).ok())
        .unwrap_or(log::LevelFilter::Info);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .level_for("redis", log::LevelFilter::Warn)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("hyper", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .apply()?;
    info!("Logging initialized at level {}.", level);
    Ok(())
}

/// Percent-encodes a query the way `encodeURIComponent` does for spaces (`%20`, not `+`).
pub fn encode_query(query: &str) -> String {
    url::form_urlencoded::byte_serialize(query.as_bytes())
        .collect::<String>()
        .replace('+', "%20") // literal '+' is already emitted as %2B
}

/// Search link for `keyword` plus an optional topic title.
pub fn search_url(keyword: &str, title: Option<&str>) -> String {
    let query = match title {
        Some(title) => format!("{} {}", keyword.trim(), title.trim()),
        None => keyword.trim().to_string(),
    };
    format!("{}{}", SEARCH_BASE_URL, encode_query(&query))
}

/// Truncate a string to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Strip markdown code fences from a response.
pub fn strip_code_fences(response: &str) -> String {
    response.replace("```json", "").replace("```JSON", "").replace("```", "")
}
