//! Extracting JSON from model output
//!
//! Models often wrap JSON in a markdown fence or surround it with prose.
//! Extraction tries, in order: the whole text, the first fenced block,
//! then the outermost `{ .. }` span.

use serde_json::Value;

/// Parse the JSON object or array contained in `text`
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();

    parse_structured(trimmed)
        .or_else(|| fenced_block(trimmed).and_then(parse_structured))
        .or_else(|| outer_object(trimmed).and_then(parse_structured))
}

fn parse_structured(candidate: &str) -> Option<Value> {
    serde_json::from_str::<Value>(candidate.trim())
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

/// Body of the first ``` fence, skipping an optional language tag
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = rest.find('\n').map_or(0, |i| i + 1);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
