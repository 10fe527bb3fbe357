//! Target selection and time ranges for an aggregation run.

use std::collections::BTreeSet;

use super::model::{PodInfo, SourceDescriptor};

/// Selectable look-back windows, in minutes (`0` is all time).
pub const TIME_RANGES: [TimeRange; 8] = [
    TimeRange { minutes: 5, label: "Last 5 min" },
    TimeRange { minutes: 15, label: "Last 15 min" },
    TimeRange { minutes: 30, label: "Last 30 min" },
    TimeRange { minutes: 60, label: "Last 1 hour" },
    TimeRange { minutes: 180, label: "Last 3 hours" },
    TimeRange { minutes: 720, label: "Last 12 hours" },
    TimeRange { minutes: 1440, label: "Last 24 hours" },
    TimeRange { minutes: 0, label: "All time" },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub minutes: u64,
    pub label: &'static str,
}

impl TimeRange {
    pub fn since_seconds(&self) -> Option<u64> {
        since_seconds(self.minutes)
    }
}

/// `0` minutes means no lower bound.
pub fn since_seconds(minutes: u64) -> Option<u64> {
    match minutes {
        0 => None,
        m => Some(m.saturating_mul(60)),
    }
}

/// Running pods, optionally of one workload, capped at `max`.
pub fn select_targets(pods: &[PodInfo], workload: Option<&str>, max: usize) -> Vec<SourceDescriptor> {
    pods.iter()
        .filter(|p| p.is_running())
        .filter(|p| workload.map_or(true, |w| p.workload() == w))
        .take(max)
        .map(SourceDescriptor::from)
        .collect()
}

/// Distinct workload names, sorted.
pub fn workloads(pods: &[PodInfo]) -> Vec<String> {
    pods.iter()
        .filter_map(|p| p.workload_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
