use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::level::LogLevel;
use super::timestamp::parse_instant;

/// A classified log line. Derived from its raw text; never stored apart
/// from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedLine {
    /// Original text, escape sequences intact (display layers color from it)
    pub raw: Arc<str>,

    pub level: LogLevel,

    /// ISO-8601 shaped timestamp, when one could be extracted
    pub timestamp: Option<String>,

    /// JSON `message`/`msg` field, or the escape-stripped line
    pub message: String,
}

impl ParsedLine {
    /// Resolve the timestamp to a UTC instant.
    ///
    /// `None` when there is no timestamp or it carries no date
    /// (e.g. a bare `[10:30:00]` stamp).
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(parse_instant)
    }
}
