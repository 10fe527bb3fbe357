use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::level::LogLevel;

/// Storage key holding the JSON array of level field names.
pub const JSON_FIELDS_KEY: &str = "log_parser_json_fields";
/// Storage key holding the JSON object of level aliases.
pub const LEVEL_MAPPING_KEY: &str = "log_parser_level_mapping";

const DEFAULT_JSON_LEVEL_FIELDS: [&str; 5] = ["level", "severity", "log_level", "loglevel", "levelname"];

const DEFAULT_LEVEL_MAPPING: [(&str, LogLevel); 16] = [
    ("error", LogLevel::Error),
    ("err", LogLevel::Error),
    ("fatal", LogLevel::Error),
    ("critical", LogLevel::Error),
    ("panic", LogLevel::Error),
    ("alert", LogLevel::Error),
    ("emerg", LogLevel::Error),
    ("emergency", LogLevel::Error),
    ("warn", LogLevel::Warn),
    ("warning", LogLevel::Warn),
    ("info", LogLevel::Info),
    ("information", LogLevel::Info),
    ("notice", LogLevel::Info),
    ("debug", LogLevel::Debug),
    ("trace", LogLevel::Trace),
    ("verbose", LogLevel::Trace),
];

/// Classifier configuration: which JSON fields carry the level, and how
/// level spellings map onto canonical levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// JSON field names checked for a level, in priority order
    pub json_level_fields: Vec<String>,
    /// Lower-cased alias → canonical level
    pub level_mapping: HashMap<String, LogLevel>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            json_level_fields: DEFAULT_JSON_LEVEL_FIELDS.iter().map(|f| f.to_string()).collect(),
            level_mapping: DEFAULT_LEVEL_MAPPING
                .iter()
                .map(|(alias, level)| (alias.to_string(), *level))
                .collect(),
        }
    }
}

impl ClassifierConfig {
    /// Map a raw level spelling onto a canonical level (case-insensitive).
    pub fn normalize(&self, raw: &str) -> LogLevel {
        self.level_mapping
            .get(&raw.to_lowercase())
            .copied()
            .unwrap_or(LogLevel::Unknown)
    }

    /// Build a config from the two serialized settings values.
    ///
    /// `fields_raw` must be a JSON array of strings; `mapping_raw` a flat JSON
    /// object of string → canonical level name. A valid mapping is merged over
    /// the default aliases. Anything missing or malformed silently keeps the
    /// corresponding default.
    pub fn from_stored(fields_raw: Option<&str>, mapping_raw: Option<&str>) -> Self {
        let mut config = Self::default();

        if let Some(fields) = fields_raw.and_then(parse_field_list) {
            config.json_level_fields = fields;
        }

        if let Some(raw) = mapping_raw {
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => {
                    config.merge_mapping(map.iter().map(|(alias, value)| (alias.as_str(), value.as_str())));
                }
                Ok(_) => debug!("Stored level mapping is not an object, keeping defaults"),
                Err(e) => debug!(error = %e, "Stored level mapping is not valid JSON, keeping defaults"),
            }
        }

        config
    }

    /// Merge `alias → level name` pairs over the current mapping. Pairs whose
    /// target is missing or not a canonical level name are skipped.
    pub fn merge_mapping<'a, I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        for (alias, target) in entries {
            match target.and_then(LogLevel::from_canonical) {
                Some(level) => {
                    self.level_mapping.insert(alias.to_lowercase(), level);
                }
                None => debug!(alias = %alias, "Ignoring level alias with non-canonical target"),
            }
        }
    }
}

fn parse_field_list(raw: &str) -> Option<Vec<String>> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Stored JSON level fields are not valid JSON, keeping defaults");
            return None;
        }
    };
    let items = value.as_array()?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_normalizes_aliases() {
        let config = ClassifierConfig::default();
        assert_eq!(config.normalize("WARNING"), LogLevel::Warn);
        assert_eq!(config.normalize("Fatal"), LogLevel::Error);
        assert_eq!(config.normalize("verbose"), LogLevel::Trace);
        assert_eq!(config.normalize("custom_level"), LogLevel::Unknown);
    }

    #[test]
    fn default_field_order() {
        let config = ClassifierConfig::default();
        assert_eq!(config.json_level_fields[0], "level");
        assert_eq!(config.json_level_fields[1], "severity");
        assert_eq!(config.json_level_fields.len(), 5);
    }

    #[test]
    fn from_stored_missing_values_keep_defaults() {
        assert_eq!(ClassifierConfig::from_stored(None, None), ClassifierConfig::default());
    }

    #[test]
    fn from_stored_replaces_field_list() {
        let config = ClassifierConfig::from_stored(Some(r#"["priority","lvl"]"#), None);
        assert_eq!(config.json_level_fields, vec!["priority", "lvl"]);
    }

    #[test]
    fn from_stored_rejects_non_string_fields() {
        let config = ClassifierConfig::from_stored(Some(r#"["priority", 3]"#), None);
        assert_eq!(config.json_level_fields, ClassifierConfig::default().json_level_fields);
    }

    #[test]
    fn from_stored_rejects_garbage() {
        let config = ClassifierConfig::from_stored(Some("not json"), Some("{broken"));
        assert_eq!(config, ClassifierConfig::default());

        let config = ClassifierConfig::from_stored(Some(r#"{"a":1}"#), Some(r#"["error"]"#));
        assert_eq!(config, ClassifierConfig::default());
    }

    #[test]
    fn from_stored_merges_mapping_over_defaults() {
        let config = ClassifierConfig::from_stored(None, Some(r#"{"severe":"error","Chatty":"debug"}"#));
        assert_eq!(config.normalize("severe"), LogLevel::Error);
        assert_eq!(config.normalize("chatty"), LogLevel::Debug);
        // Defaults survive the merge
        assert_eq!(config.normalize("warning"), LogLevel::Warn);
    }

    #[test]
    fn from_stored_ignores_invalid_targets() {
        let config = ClassifierConfig::from_stored(None, Some(r#"{"severe":"catastrophic","x":5}"#));
        assert_eq!(config.normalize("severe"), LogLevel::Unknown);
        assert_eq!(config.normalize("x"), LogLevel::Unknown);
    }
}
