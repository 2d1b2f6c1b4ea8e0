//! Locating the JSON object inside raw completion text.
//!
//! Strategies run in a fixed order and the first one that yields a JSON
//! object wins:
//! 1. the whole text,
//! 2. the interior of the first fenced code block,
//! 3. the span from the first `{` to the last `}`.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

use crate::types::{Error, Result};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*[^\S\n]*\n?(.*?)```").expect("fenced block pattern")
});

static BRACE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("brace span pattern"));

/// Which strategy produced the document. Logged for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Fenced,
    BraceSpan,
}

/// Extract the first JSON object found by the strategy chain.
pub fn extract_object(raw: &str) -> Result<(Map<String, Value>, Strategy)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::parse("empty completion response"));
    }

    if let Some(obj) = parse_object(trimmed) {
        return Ok((obj, Strategy::Direct));
    }

    if let Some(obj) = FENCED_BLOCK
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_object(m.as_str()))
    {
        return Ok((obj, Strategy::Fenced));
    }

    if let Some(obj) = BRACE_SPAN
        .find(trimmed)
        .and_then(|m| parse_object(m.as_str()))
    {
        return Ok((obj, Strategy::BraceSpan));
    }

    debug!(len = raw.len(), "no JSON object found in completion response");
    Err(Error::parse(format!(
        "no JSON object found in response ({} chars)",
        raw.len()
    )))
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct() {
        let (obj, strategy) = extract_object(r#"  {"cropType": "Wheat"} "#).unwrap();
        assert_eq!(strategy, Strategy::Direct);
        assert_eq!(obj["cropType"], "Wheat");
    }

    #[test]
    fn test_fenced_with_language_tag() {
        let raw = "Here is my analysis:\n```json\n{\"cropType\": \"Rice\"}\n```\nHope it helps.";
        let (obj, strategy) = extract_object(raw).unwrap();
        assert_eq!(strategy, Strategy::Fenced);
        assert_eq!(obj["cropType"], "Rice");
    }

    #[test]
    fn test_bare_fence() {
        let raw = "```\n{\"cropType\": \"Maize\"}\n```";
        let (obj, strategy) = extract_object(raw).unwrap();
        assert_eq!(strategy, Strategy::Fenced);
        assert_eq!(obj["cropType"], "Maize");
    }

    #[test]
    fn test_brace_span_in_prose() {
        let raw = "The result is {\"cropType\": \"Grape\", \"x\": {\"y\": 1}} as requested.";
        let (obj, strategy) = extract_object(raw).unwrap();
        assert_eq!(strategy, Strategy::BraceSpan);
        assert_eq!(obj["x"]["y"], 1);
    }

    #[test]
    fn test_arrays_and_garbage_fail() {
        assert!(extract_object("[1, 2, 3]").is_err());
        assert!(extract_object("I could not analyze this image.").is_err());
        assert!(extract_object("{ not json at all }").is_err());
        assert!(extract_object("   ").is_err());
    }
}
