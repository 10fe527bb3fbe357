use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

/// Forces the wrapped counters onto their own cache line, so per-source
/// tasks bumping different groups do not contend.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Subscription lifecycle counters
#[derive(Debug, Default)]
pub struct StreamMetrics {
    pub started: AtomicU64,
    pub failed: AtomicU64,
    pub closed: AtomicU64,
    pub active: AtomicI64,
}

/// Per-batch counters
#[derive(Debug, Default)]
pub struct BatchMetrics {
    pub received: AtomicU64,
    /// Batches discarded after a classification panic
    pub dropped: AtomicU64,
    pub panics: AtomicU64,
}

/// Per-line counters (hottest path)
#[derive(Debug, Default)]
pub struct LineMetrics {
    pub classified: AtomicU64,
    pub retained: AtomicU64,
    pub evicted: AtomicU64,
}

/// Counters for aggregation runs.
///
/// Shared by every run of one [`super::Aggregator`]. All operations use
/// `Ordering::Relaxed`; `snapshot()` is not transactional across fields.
#[derive(Debug, Default)]
pub struct AggregatorMetrics {
    pub streams: CacheAligned<StreamMetrics>,
    pub batches: CacheAligned<BatchMetrics>,
    pub lines: CacheAligned<LineMetrics>,
}

impl AggregatorMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_stream_started(&self) {
        self.streams.0.started.fetch_add(1, Ordering::Relaxed);
        self.streams.0.active.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stream_failed(&self) {
        self.streams.0.failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_stream_closed(&self, was_open: bool) {
        self.streams.0.closed.fetch_add(1, Ordering::Relaxed);
        if was_open {
            self.streams.0.active.fetch_sub(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_batch(&self, lines: usize) {
        self.batches.0.received.fetch_add(1, Ordering::Relaxed);
        self.lines.0.classified.fetch_add(lines as u64, Ordering::Relaxed);
    }

    /// A classification panic; the batch chunk is discarded.
    #[inline]
    pub fn record_panic(&self) {
        self.batches.0.panics.fetch_add(1, Ordering::Relaxed);
        self.batches.0.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_retained(&self, retained: usize, evicted: usize) {
        self.lines.0.retained.fetch_add(retained as u64, Ordering::Relaxed);
        self.lines.0.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> AggregatorMetricsSnapshot {
        let classified = self.lines.0.classified.load(Ordering::Relaxed);
        let retained = self.lines.0.retained.load(Ordering::Relaxed);

        AggregatorMetricsSnapshot {
            streams_started: self.streams.0.started.load(Ordering::Relaxed),
            streams_failed: self.streams.0.failed.load(Ordering::Relaxed),
            streams_closed: self.streams.0.closed.load(Ordering::Relaxed),
            streams_active: self.streams.0.active.load(Ordering::Relaxed),

            batches_received: self.batches.0.received.load(Ordering::Relaxed),
            batches_dropped: self.batches.0.dropped.load(Ordering::Relaxed),
            classify_panics: self.batches.0.panics.load(Ordering::Relaxed),

            lines_classified: classified,
            lines_retained: retained,
            lines_evicted: self.lines.0.evicted.load(Ordering::Relaxed),
            problem_ratio: if classified > 0 { retained as f64 / classified as f64 } else { 0.0 },
        }
    }
}

/// A read-only, serializable snapshot of [`AggregatorMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct AggregatorMetricsSnapshot {
    pub streams_started: u64,
    pub streams_failed: u64,
    pub streams_closed: u64,
    pub streams_active: i64,

    pub batches_received: u64,
    pub batches_dropped: u64,
    pub classify_panics: u64,

    pub lines_classified: u64,
    pub lines_retained: u64,
    pub lines_evicted: u64,
    /// Share of classified lines that were errors or warnings
    pub problem_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_empty() {
        let snap = AggregatorMetrics::new().snapshot();
        assert_eq!(snap.streams_started, 0);
        assert_eq!(snap.lines_classified, 0);
        assert_eq!(snap.problem_ratio, 0.0);
    }

    #[test]
    fn test_stream_lifecycle() {
        let metrics = AggregatorMetrics::new();
        metrics.record_stream_started();
        metrics.record_stream_started();
        metrics.record_stream_failed();
        metrics.record_stream_closed(true);
        metrics.record_stream_closed(false);

        let snap = metrics.snapshot();
        assert_eq!(snap.streams_started, 2);
        assert_eq!(snap.streams_failed, 1);
        assert_eq!(snap.streams_closed, 2);
        assert_eq!(snap.streams_active, 1);
    }

    #[test]
    fn test_line_counters() {
        let metrics = AggregatorMetrics::new();
        metrics.record_batch(10);
        metrics.record_retained(4, 1);
        metrics.record_panic();

        let snap = metrics.snapshot();
        assert_eq!(snap.batches_received, 1);
        assert_eq!(snap.batches_dropped, 1);
        assert_eq!(snap.classify_panics, 1);
        assert_eq!(snap.lines_evicted, 1);
        assert!((snap.problem_ratio - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cache_alignment() {
        assert_eq!(std::mem::align_of::<CacheAligned<StreamMetrics>>(), 64);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(AggregatorMetrics::new().snapshot()).unwrap();
        assert_eq!(json["streams_active"], 0);
    }
}
