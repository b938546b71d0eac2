//! Defensive parsing of provider replies.
//!
//! Providers return raw text that is ideally JSON of a known shape. This
//! module recovers the JSON from common formatting mistakes and, when
//! nothing works, yields an empty value of the expected shape so callers
//! degrade instead of failing.

use serde_json::{Map, Value};
use tracing::warn;

/// Parse a reply expected to hold a JSON array.
///
/// Returns an empty vector, with a warning, when the reply is not a JSON
/// array after every recovery strategy.
pub fn parse_json_array(raw: &str) -> Vec<Value> {
    match try_parse(raw) {
        Some(Value::Array(items)) => items,
        Some(other) => {
            warn!(
                found = json_kind(&other),
                "reply was not a JSON array, using empty array"
            );
            Vec::new()
        }
        None => {
            warn!(raw_response = raw, "failed to parse reply, using empty array");
            Vec::new()
        }
    }
}

/// Parse a reply expected to hold a JSON object.
///
/// Returns an empty map, with a warning, when the reply is not a JSON
/// object after every recovery strategy.
pub fn parse_json_object(raw: &str) -> Map<String, Value> {
    match try_parse(raw) {
        Some(Value::Object(map)) => map,
        Some(other) => {
            warn!(
                found = json_kind(&other),
                "reply was not a JSON object, using empty object"
            );
            Map::new()
        }
        None => {
            warn!(raw_response = raw, "failed to parse reply, using empty object");
            Map::new()
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Attempt to parse the reply through multiple recovery strategies:
/// 1. Direct `serde_json` parse
/// 2. Extract JSON from a markdown code block
/// 3. Strip trailing commas and retry
/// 4. Extract from a code block, then strip commas
fn try_parse(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let block = extract_json_from_codeblock(trimmed);
    if let Some(json_str) = block
        && let Ok(value) = serde_json::from_str::<Value>(json_str)
    {
        return Some(value);
    }

    if let Ok(value) = serde_json::from_str::<Value>(&strip_trailing_commas(trimmed)) {
        return Some(value);
    }

    block.and_then(|json_str| serde_json::from_str(&strip_trailing_commas(json_str)).ok())
}

/// Extract the body of the first fenced code block, preferring ```` ```json ````.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let body_start = |tag: &str| {
        text.find(tag).map(|i| {
            let after_tag = i.checked_add(tag.len()).unwrap_or(i);
            // Skip the rest of the fence line (language tag, spaces).
            text.get(after_tag..)
                .and_then(|s| s.find('\n'))
                .and_then(|nl| after_tag.checked_add(nl))
                .and_then(|pos| pos.checked_add(1))
                .unwrap_or(after_tag)
        })
    };

    let start = body_start("```json").or_else(|| body_start("```"))?;
    let remaining = text.get(start..)?;
    let end = remaining.find("```")?;
    remaining.get(..end).map(str::trim)
}

/// Strip trailing commas before closing braces and brackets.
///
/// Commas inside string literals are left alone.
fn strip_trailing_commas(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                result.push(c);
            }
            ',' => {
                let next = chars.clone().find(|n| !n.is_whitespace());
                if !matches!(next, Some('}' | ']')) {
                    result.push(c);
                }
            }
            _ => result.push(c),
        }
    }

    result
}
