// src/search/prompts.rs
use crate::types::KeywordRequest;

const BATCH_HEADER: &str =
    "Search the web for the most recent trending news topics for each keyword below.";

/// Prompt asking for `max_results` topics about one keyword as a bare JSON array.
pub fn keyword_prompt(keyword: &str, max_results: usize) -> String {
    format!(
        "Search the web for the {max} most recent trending news topics about \"{keyword}\".\n\
         Respond with ONLY a JSON array, no prose and no code fences, in this exact shape:\n\
         [{{\"title\": \"short headline\", \"summary\": \"one or two sentence summary\", \"url\": \"source link\"}}]\n\
         Return at most {max} objects. Keep each summary under 300 characters.",
        max = max_results,
        keyword = keyword
    )
}

/// Prompt covering several keywords in one call, answered as `[{keyword, topics}]`.
pub fn batch_prompt(requests: &[KeywordRequest]) -> String {
    let wanted = requests
        .iter()
        .map(|r| format!("- \"{}\": {} topics", r.keyword(), r.max_results()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{header}\n\
         {wanted}\n\
         Respond with ONLY a JSON array, no prose and no code fences, with one element per keyword \
         using the keyword exactly as written:\n\
         [{{\"keyword\": \"keyword\", \"topics\": [{{\"title\": \"short headline\", \"summary\": \"one or two sentence summary\", \"url\": \"source link\"}}]}}]\n\
         Keep each summary under 300 characters.",
        header = BATCH_HEADER,
        wanted = wanted
    )
}

pub fn is_batch_prompt(prompt: &str) -> bool {
    prompt.starts_with(BATCH_HEADER)
}
