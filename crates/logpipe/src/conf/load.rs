//! Load: config loading from file and environment variables.

use std::path::Path;

use thiserror::Error;

use super::model::PipelineConfig;

pub const CONFIG_FILE_ENV: &str = "LOGPIPE_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "/etc/logpipe/pipeline.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl PipelineConfig {
    /// Load configuration from file or environment variables.
    /// Priority: Config File > Environment Variables > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = std::env::var(CONFIG_FILE_ENV)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using environment variables", config_path);
            Self::from_env()
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Load configuration from `LOGPIPE_*` environment variables with defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let num = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let float = |key: &str| lookup(key).and_then(|s| s.trim().parse::<f64>().ok());

        Self {
            max_buffer_lines: num("LOGPIPE_MAX_BUFFER_LINES")
                .map_or(defaults.max_buffer_lines, |v| v as usize),
            page_size: num("LOGPIPE_PAGE_SIZE").map_or(defaults.page_size, |v| v as usize),
            max_concurrent_streams: num("LOGPIPE_MAX_STREAMS")
                .map_or(defaults.max_concurrent_streams, |v| v as usize),
            max_aggregated_entries: num("LOGPIPE_MAX_AGGREGATED_ENTRIES")
                .map_or(defaults.max_aggregated_entries, |v| v as usize),
            tail_lines: num("LOGPIPE_TAIL_LINES").unwrap_or(defaults.tail_lines),
            follow_tolerance_px: float("LOGPIPE_FOLLOW_TOLERANCE_PX")
                .unwrap_or(defaults.follow_tolerance_px),
            load_more_threshold_px: float("LOGPIPE_LOAD_MORE_THRESHOLD_PX")
                .unwrap_or(defaults.load_more_threshold_px),
            classify_chunk: num("LOGPIPE_CLASSIFY_CHUNK")
                .map_or(defaults.classify_chunk, |v| v as usize),
            classifier: defaults.classifier,
        }
    }

    /// Reject caps that would make the pipeline unusable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let caps = [
            ("max_buffer_lines", self.max_buffer_lines),
            ("page_size", self.page_size),
            ("max_concurrent_streams", self.max_concurrent_streams),
            ("max_aggregated_entries", self.max_aggregated_entries),
            ("classify_chunk", self.classify_chunk),
        ];
        for (name, value) in caps {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be > 0", name)));
            }
        }
        let valid_px = |px: f64| px.is_finite() && px >= 0.0;
        if !valid_px(self.follow_tolerance_px) || !valid_px(self.load_more_threshold_px) {
            return Err(ConfigError::Invalid("scroll thresholds must be >= 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_partial_toml() {
        let config = PipelineConfig::from_toml(
            r#"
            page_size = 200
            tail_lines = 1000

            [classifier]
            json_level_fields = ["lvl", "level"]
            level_mapping = { severe = "error" }
            "#,
        )
        .unwrap();

        assert_eq!(config.page_size, 200);
        assert_eq!(config.tail_lines, 1000);
        assert_eq!(config.max_buffer_lines, 50_000);
        assert_eq!(config.classifier.json_level_fields.as_deref(), Some(&["lvl".to_string(), "level".to_string()][..]));
        assert_eq!(config.classifier.level_mapping.get("severe").map(String::as_str), Some("error"));
    }

    #[test]
    fn from_file_reports_path() {
        let path = std::env::temp_dir().join(format!("logpipe-conf-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "page_size = \"many\"").unwrap();
        drop(file);

        let path_str = path.to_string_lossy().to_string();
        let err = PipelineConfig::from_file(&path_str).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&path_str));
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(
            PipelineConfig::from_file("/nonexistent/logpipe.toml"),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn env_lookup_with_defaults() {
        let vars: HashMap<&str, &str> = [
            ("LOGPIPE_PAGE_SIZE", "250"),
            ("LOGPIPE_MAX_STREAMS", "not-a-number"),
            ("LOGPIPE_FOLLOW_TOLERANCE_PX", "12.5"),
        ]
        .into_iter()
        .collect();
        let config = PipelineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.page_size, 250);
        assert_eq!(config.max_concurrent_streams, 20);
        assert_eq!(config.follow_tolerance_px, 12.5);
        assert_eq!(config.max_buffer_lines, 50_000);
    }

    #[test]
    fn validate_rejects_zero_caps() {
        assert!(PipelineConfig::default().validate().is_ok());

        let config = PipelineConfig { max_concurrent_streams: 0, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid configuration: max_concurrent_streams must be > 0");

        let config = PipelineConfig { follow_tolerance_px: f64::NAN, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
