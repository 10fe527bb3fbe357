//! Model: PipelineConfig and related structs.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aggregate::AggregatorLimits;
use crate::parser::ClassifierConfig;
use crate::viewer::ViewerOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Per-session line buffer cap
    pub max_buffer_lines: usize,
    /// Viewer window size and load-more step
    pub page_size: usize,
    pub max_concurrent_streams: usize,
    pub max_aggregated_entries: usize,
    /// Historical lines requested when a log session opens
    pub tail_lines: u64,
    pub follow_tolerance_px: f64,
    pub load_more_threshold_px: f64,
    /// Aggregator lines classified between yields
    pub classify_chunk: usize,
    pub classifier: ClassifierSection,
}

/// Classifier overrides; absent values keep the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    pub json_level_fields: Option<Vec<String>>,
    /// Alias → canonical level name, merged over the default aliases
    pub level_mapping: HashMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_buffer_lines: 50_000,
            page_size: 500,
            max_concurrent_streams: 20,
            max_aggregated_entries: 2000,
            tail_lines: 500,
            follow_tolerance_px: 30.0,
            load_more_threshold_px: 50.0,
            classify_chunk: 256,
            classifier: ClassifierSection::default(),
        }
    }
}

impl PipelineConfig {
    pub fn viewer_options(&self) -> ViewerOptions {
        ViewerOptions {
            page_size: self.page_size,
            follow_tolerance_px: self.follow_tolerance_px,
            load_more_threshold_px: self.load_more_threshold_px,
        }
    }

    pub fn aggregator_limits(&self) -> AggregatorLimits {
        AggregatorLimits {
            max_streams: self.max_concurrent_streams,
            max_entries: self.max_aggregated_entries,
            classify_chunk: self.classify_chunk,
        }
    }

    /// Defaults with the `[classifier]` overrides applied.
    pub fn classifier_config(&self) -> Arc<ClassifierConfig> {
        let mut config = ClassifierConfig::default();
        if let Some(fields) = &self.classifier.json_level_fields {
            config.json_level_fields = fields.clone();
        }
        config.merge_mapping(
            self.classifier
                .level_mapping
                .iter()
                .map(|(alias, target)| (alias.as_str(), Some(target.as_str()))),
        );
        Arc::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LogLevel;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.viewer_options(), ViewerOptions::default());
        assert_eq!(config.aggregator_limits(), AggregatorLimits::default());
        assert_eq!(*config.classifier_config(), ClassifierConfig::default());
    }

    #[test]
    fn classifier_overrides() {
        let mut config = PipelineConfig::default();
        config.classifier.json_level_fields = Some(vec!["lvl".into()]);
        config.classifier.level_mapping.insert("SEVERE".into(), "error".into());
        config.classifier.level_mapping.insert("odd".into(), "loud".into());

        let classifier = config.classifier_config();
        assert_eq!(classifier.json_level_fields, vec!["lvl"]);
        assert_eq!(classifier.normalize("severe"), LogLevel::Error);
        assert_eq!(classifier.normalize("odd"), LogLevel::Unknown);
        assert_eq!(classifier.normalize("warning"), LogLevel::Warn);
    }
}
