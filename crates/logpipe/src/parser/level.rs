use serde::{Deserialize, Serialize};

/// Canonical log level assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
    /// Nothing recognizable in the line
    Unknown,
}

impl LogLevel {
    /// Every level, in filter-chip display order.
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
        LogLevel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
            LogLevel::Unknown => "unknown",
        }
    }

    /// Label shown on the viewer's level filter chips.
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
            LogLevel::Unknown => "OTHER",
        }
    }

    /// Parse a canonical level name (`"error"`, `"warn"`, ...).
    ///
    /// Only the six canonical names are accepted; aliases such as `"fatal"`
    /// go through [`super::ClassifierConfig::normalize`] instead.
    pub fn from_canonical(name: &str) -> Option<Self> {
        match name {
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            "unknown" => Some(LogLevel::Unknown),
            _ => None,
        }
    }

    /// Dense index into per-level arrays (see [`Self::ALL`]).
    pub fn index(&self) -> usize {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
            LogLevel::Trace => 4,
            LogLevel::Unknown => 5,
        }
    }

    pub fn is_problem(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Warn)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed text-path token groups, scanned in priority order.
///
/// Each entry is the alternation used inside a case-insensitive,
/// word-bounded pattern and the level it maps to by default.
pub(crate) const TEXT_LEVEL_TOKENS: [(&str, LogLevel); 5] = [
    ("ERROR|ERR|FATAL|CRITICAL|PANIC|ALERT|EMERG|EMERGENCY", LogLevel::Error),
    ("WARN|WARNING", LogLevel::Warn),
    ("INFO|INFORMATION|NOTICE", LogLevel::Info),
    ("DEBUG", LogLevel::Debug),
    ("TRACE|VERBOSE", LogLevel::Trace),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_round_trip() {
        for level in LogLevel::ALL {
            assert_eq!(LogLevel::from_canonical(level.as_str()), Some(level));
        }
        assert_eq!(LogLevel::from_canonical("fatal"), None);
        assert_eq!(LogLevel::from_canonical("ERROR"), None);
    }

    #[test]
    fn index_matches_display_order() {
        for (i, level) in LogLevel::ALL.iter().enumerate() {
            assert_eq!(level.index(), i);
        }
    }

    #[test]
    fn unknown_is_labelled_other() {
        assert_eq!(LogLevel::Unknown.label(), "OTHER");
        assert_eq!(LogLevel::Warn.label(), "WARN");
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&LogLevel::Warn).unwrap();
        assert_eq!(json, "\"warn\"");
    }
}
