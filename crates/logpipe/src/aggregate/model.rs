use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::parser::{LogLevel, ParsedLine};

/// Pod inventory row used to pick aggregation targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    #[serde(default)]
    pub workload_name: Option<String>,
    pub status: String,
}

impl PodInfo {
    /// Owning workload, or the pod itself when it has none.
    pub fn workload(&self) -> &str {
        self.workload_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_running(&self) -> bool {
        self.status == "Running"
    }
}

/// One aggregation source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Pod name; also the source identity shown next to entries
    pub source_id: String,
    pub workload_name: String,
}

impl SourceDescriptor {
    pub fn new(source_id: impl Into<String>, workload_name: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), workload_name: workload_name.into() }
    }
}

impl From<&PodInfo> for SourceDescriptor {
    fn from(pod: &PodInfo) -> Self {
        Self::new(pod.name.clone(), pod.workload())
    }
}

/// A problem line kept by the aggregation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetainedLine {
    /// Arrival order across all sources
    pub seq: u64,
    pub source_id: String,
    pub workload_name: String,
    pub line: ParsedLine,
    /// Resolved instant, or the arrival wall-clock time
    pub epoch_ms: i64,
}

/// A deduplicated group of retained lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedEntry {
    /// The most recent line of the group
    pub line: ParsedLine,
    pub source_id: String,
    pub workload_name: String,
    pub epoch_ms: i64,
    pub count: usize,
    /// Every source that produced the group
    pub sources: BTreeSet<String>,
    #[serde(skip)]
    pub seq: u64,
}

impl AggregatedEntry {
    pub fn level(&self) -> LogLevel {
        self.line.level
    }

    /// `"3 pods"` for multi-source groups, else the one source.
    pub fn source_label(&self) -> String {
        if self.count > 1 {
            format!("{} pods", self.sources.len())
        } else {
            self.source_id.clone()
        }
    }
}

/// Open progress of an aggregation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationProgress {
    pub requested: usize,
    pub started: usize,
    pub failed: usize,
    /// Opens not yet resolved
    pub pending: usize,
}

impl AggregationProgress {
    pub fn is_loading(&self) -> bool {
        self.pending > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workload_falls_back_to_pod_name() {
        let pod = PodInfo { name: "solo".into(), workload_name: None, status: "Running".into() };
        assert_eq!(pod.workload(), "solo");
        assert_eq!(SourceDescriptor::from(&pod), SourceDescriptor::new("solo", "solo"));
    }

    #[test]
    fn pod_info_deserializes_without_workload() {
        let pod: PodInfo = serde_json::from_str(r#"{"name":"a","status":"Pending"}"#).unwrap();
        assert_eq!(pod.workload_name, None);
        assert!(!pod.is_running());
    }
}
