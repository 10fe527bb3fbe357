//! Line classification: JSON object path first, free-text heuristics second.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::ansi::strip_ansi_codes;
use super::config::ClassifierConfig;
use super::level::{LogLevel, TEXT_LEVEL_TOKENS};
use super::model::ParsedLine;
use super::timestamp::extract_timestamp;

const JSON_MESSAGE_FIELDS: [&str; 2] = ["message", "msg"];
const JSON_TIMESTAMP_FIELDS: [&str; 4] = ["timestamp", "time", "ts", "@timestamp"];

/// Case-insensitive token patterns in priority order. Word boundaries are
/// ASCII-only, so a token glued to a non-ASCII letter still counts.
static TEXT_LEVEL_PATTERNS: Lazy<Vec<(Regex, LogLevel)>> = Lazy::new(|| {
    TEXT_LEVEL_TOKENS
        .iter()
        .map(|(tokens, level)| {
            let pattern = format!(r"(?i)(?-u:\b)({})(?-u:\b)", tokens);
            let re = Regex::new(&pattern).expect("level token pattern compiles");
            (re, *level)
        })
        .collect()
});

/// Classify one raw line.
///
/// Pure and deterministic: the same `(raw, config)` always yields the same
/// [`ParsedLine`]. Never fails; unresolvable parts come back as
/// [`LogLevel::Unknown`] or an absent timestamp.
pub fn classify(raw: impl Into<Arc<str>>, config: &ClassifierConfig) -> ParsedLine {
    let raw: Arc<str> = raw.into();
    let plain = strip_ansi_codes(&raw);

    if let Some(obj) = parse_json_object(&plain) {
        let level = json_level(&obj, config);
        let message = first_string(&obj, &JSON_MESSAGE_FIELDS)
            .map(str::to_string)
            .unwrap_or_else(|| plain.to_string());
        let timestamp = first_string(&obj, &JSON_TIMESTAMP_FIELDS)
            .map(str::to_string)
            .or_else(|| extract_timestamp(&plain));

        return ParsedLine {
            raw,
            level,
            timestamp,
            message,
        };
    }

    let level = text_level(&plain, config);
    let timestamp = extract_timestamp(&plain);
    let message = plain.into_owned();

    ParsedLine {
        raw,
        level,
        timestamp,
        message,
    }
}

/// Parse `plain` as a JSON object. Arrays, primitives and malformed input
/// return `None` so the caller falls through to the text path.
fn parse_json_object(plain: &str) -> Option<Map<String, Value>> {
    let trimmed = plain.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

fn json_level(obj: &Map<String, Value>, config: &ClassifierConfig) -> LogLevel {
    for field in &config.json_level_fields {
        if let Some(Value::String(value)) = obj.get(field) {
            if value.is_empty() {
                continue;
            }
            let level = config.normalize(value);
            if level != LogLevel::Unknown {
                return level;
            }
        }
    }
    LogLevel::Unknown
}

fn first_string<'a>(obj: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a str> {
    fields.iter().find_map(|field| obj.get(*field).and_then(Value::as_str))
}

/// Scan the fixed token groups in priority order. A configured alias for the
/// matched token wins over the group's default level.
fn text_level(plain: &str, config: &ClassifierConfig) -> LogLevel {
    for (pattern, default_level) in TEXT_LEVEL_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(plain) {
            let mapped = caps
                .get(1)
                .map(|token| config.normalize(token.as_str()))
                .unwrap_or(LogLevel::Unknown);
            return if mapped != LogLevel::Unknown { mapped } else { *default_level };
        }
    }
    LogLevel::Unknown
}
