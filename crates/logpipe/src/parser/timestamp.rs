//! Timestamp extraction from free text.
//!
//! Three shapes are tried in order; the first hit wins:
//! 1. ISO-8601: `2024-01-15T10:30:00.123+05:30`
//! 2. Bracketed: `[2024-01-15 10:30:00.123 +0000]` or `[10:30:00]`
//! 3. Bare date-space-time: `2024-01-15 10:30:00 +0000`
//!
//! Shapes 2 and 3 are normalized toward ISO-8601 so a standard parser
//! accepts them.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?(?:Z|[+-][0-9]{2}:?[0-9]{2})?")
        .expect("ISO timestamp pattern compiles")
});

static BRACKET_TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[([0-9]{4}-[0-9]{2}-[0-9]{2}[\sT][0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?(?:\s*[+-][0-9]{4})?|[0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?)\]",
    )
    .expect("bracket timestamp pattern compiles")
});

static DATETIME_SPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}\s[0-9]{2}:[0-9]{2}:[0-9]{2}(?:\.[0-9]+)?(?:\s*[+-][0-9]{4})?")
        .expect("date-time pattern compiles")
});

static DATE_TIME_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4}-[0-9]{2}-[0-9]{2})\s([0-9]{2}:[0-9]{2}:[0-9]{2})")
        .expect("separator pattern compiles")
});

static TRAILING_OFFSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*([+-])([0-9]{2})([0-9]{2})$")
        .expect("offset pattern compiles")
});

/// Find the first timestamp in `text`.
pub fn extract_timestamp(text: &str) -> Option<String> {
    if let Some(m) = ISO_TIMESTAMP_RE.find(text) {
        return Some(m.as_str().to_string());
    }
    if let Some(caps) = BRACKET_TIMESTAMP_RE.captures(text) {
        if let Some(inner) = caps.get(1) {
            return Some(normalize_timestamp(inner.as_str()));
        }
    }
    DATETIME_SPACE_RE
        .find(text)
        .map(|m| normalize_timestamp(m.as_str()))
}

/// `2024-01-15 10:30:00.123 +0000` → `2024-01-15T10:30:00.123+00:00`
pub fn normalize_timestamp(raw: &str) -> String {
    let ts = raw.trim();
    let ts = DATE_TIME_SEPARATOR_RE.replace(ts, "${1}T${2}");
    TRAILING_OFFSET_RE.replace(&ts, "${1}${2}:${3}").into_owned()
}

/// Resolve an extracted timestamp to a UTC instant.
///
/// Accepts RFC 3339, offsets written without a colon, and offset-less
/// date-times (taken as UTC). Time-only stamps have no date and yield `None`.
pub fn parse_instant(ts: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(ts, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn iso_timestamp_is_returned_verbatim() {
        assert_eq!(
            extract_timestamp("2024-01-15T10:30:00.123+05:30 INFO started").as_deref(),
            Some("2024-01-15T10:30:00.123+05:30")
        );
        assert_eq!(
            extract_timestamp("at 2024-01-15T10:30:00Z boom").as_deref(),
            Some("2024-01-15T10:30:00Z")
        );
    }

    #[test]
    fn bracket_timestamp_is_normalized() {
        assert_eq!(
            extract_timestamp("[2024-01-15 10:30:00] WARN Connection pool low").as_deref(),
            Some("2024-01-15T10:30:00")
        );
        assert_eq!(
            extract_timestamp("[2026-02-15 10:08:59.711 -0500] WARN something").as_deref(),
            Some("2026-02-15T10:08:59.711-05:00")
        );
    }

    #[test]
    fn bracket_time_only_is_kept() {
        assert_eq!(extract_timestamp("[10:30:00] INFO started").as_deref(), Some("10:30:00"));
        assert_eq!(parse_instant("10:30:00"), None);
    }

    #[test]
    fn bare_datetime_is_normalized() {
        assert_eq!(
            extract_timestamp("2026-02-15 10:08:59.711 +0000 ERROR something failed").as_deref(),
            Some("2026-02-15T10:08:59.711+00:00")
        );
    }

    #[test]
    fn no_timestamp() {
        assert_eq!(extract_timestamp("just some output text"), None);
        assert_eq!(extract_timestamp(""), None);
    }

    #[test]
    fn normalize_only_touches_separator_and_offset() {
        assert_eq!(normalize_timestamp(" 2024-01-15 10:30:00 "), "2024-01-15T10:30:00");
        assert_eq!(normalize_timestamp("2024-01-15 10:30:00+0130"), "2024-01-15T10:30:00+01:30");
        assert_eq!(normalize_timestamp("10:30:00.5"), "10:30:00.5");
    }

    #[test]
    fn parse_instant_accepts_all_normalized_shapes() {
        let with_offset = parse_instant("2026-02-15T10:08:59.711+00:00").unwrap();
        assert_eq!(with_offset.hour(), 10);
        assert_eq!(with_offset.nanosecond(), 711_000_000);

        let negative = parse_instant("2026-02-15T10:08:59.711-05:00").unwrap();
        assert_eq!(negative.hour(), 15);

        let compact = parse_instant("2024-01-15T10:30:00+0530").unwrap();
        assert_eq!((compact.hour(), compact.minute()), (5, 0));

        let naive = parse_instant("2024-01-15T10:30:00").unwrap();
        assert_eq!((naive.year(), naive.day(), naive.hour()), (2024, 15, 10));

        assert!(parse_instant("2024-01-15T10:30:00Z").is_some());
        assert!(parse_instant("yesterday").is_none());
    }
}
