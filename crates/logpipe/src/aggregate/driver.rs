//! Aggregation driver.
//!
//! One tokio task per source. Each task opens its subscription, classifies
//! incoming batches in chunks, and inserts problem lines into the shared
//! table. Stopping cancels every task; each task closes its own
//! subscription once on the way out.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::metrics::AggregatorMetrics;
use super::model::{AggregatedEntry, AggregationProgress, SourceDescriptor};
use super::table::{EntryTable, DEFAULT_MAX_ENTRIES};
use crate::filter::FilterEngine;
use crate::parser::{classify, ClassifierConfig, ParsedLine};
use crate::session::model::{LogTarget, SessionId, TargetKind};
use crate::source::{StreamEvent, StreamRequest, StreamSource};

pub const DEFAULT_MAX_STREAMS: usize = 20;
pub const DEFAULT_CLASSIFY_CHUNK: usize = 256;

type ClassifyFn = fn(&str, &ClassifierConfig) -> ParsedLine;

fn classify_line(raw: &str, config: &ClassifierConfig) -> ParsedLine {
    classify(raw, config)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorLimits {
    /// Concurrency ceiling on subscriptions per run
    pub max_streams: usize,
    /// Retained problem lines per run
    pub max_entries: usize,
    /// Lines classified between cooperative yields
    pub classify_chunk: usize,
}

impl Default for AggregatorLimits {
    fn default() -> Self {
        Self {
            max_streams: DEFAULT_MAX_STREAMS,
            max_entries: DEFAULT_MAX_ENTRIES,
            classify_chunk: DEFAULT_CLASSIFY_CHUNK,
        }
    }
}

/// Starts aggregation runs against a [`StreamSource`].
pub struct Aggregator {
    source: Arc<dyn StreamSource>,
    classifier: Arc<ClassifierConfig>,
    limits: AggregatorLimits,
    metrics: Arc<AggregatorMetrics>,
    classify_fn: ClassifyFn,
}

impl Aggregator {
    pub fn new(source: Arc<dyn StreamSource>, classifier: Arc<ClassifierConfig>) -> Self {
        Self {
            source,
            classifier,
            limits: AggregatorLimits::default(),
            metrics: Arc::new(AggregatorMetrics::new()),
            classify_fn: classify_line,
        }
    }

    pub fn with_limits(mut self, limits: AggregatorLimits) -> Self {
        self.limits = limits;
        self
    }

    #[cfg(test)]
    fn with_classify_fn(mut self, classify_fn: ClassifyFn) -> Self {
        self.classify_fn = classify_fn;
        self
    }

    pub fn limits(&self) -> AggregatorLimits {
        self.limits
    }

    pub fn metrics(&self) -> &Arc<AggregatorMetrics> {
        &self.metrics
    }

    /// Open a subscription per source, up to the concurrency ceiling, and
    /// return at once. Must be called from within a tokio runtime.
    pub fn start(
        &self,
        mut sources: Vec<SourceDescriptor>,
        since_seconds: Option<u64>,
        text_filter: Option<String>,
    ) -> AggregationHandle {
        if sources.len() > self.limits.max_streams {
            warn!(
                requested = sources.len(),
                max = self.limits.max_streams,
                "Too many sources; extra sources ignored"
            );
            sources.truncate(self.limits.max_streams);
        }
        info!(sources = sources.len(), since_seconds = ?since_seconds, "Starting aggregation");

        let token = CancellationToken::new();
        let table = Arc::new(Mutex::new(EntryTable::new(self.limits.max_entries)));
        let progress = Arc::new(Progress::new(sources.len()));

        let tasks: Vec<JoinHandle<()>> = sources
            .into_iter()
            .map(|descriptor| {
                let request = StreamRequest {
                    session_id: SessionId::with_prefix(&format!("errors-{}", descriptor.source_id)),
                    target: LogTarget::new(TargetKind::Pod, descriptor.source_id.clone()),
                    container: None,
                    tail_lines: None,
                    since_seconds,
                };
                let task = SourceTask {
                    source: Arc::clone(&self.source),
                    classifier: Arc::clone(&self.classifier),
                    classify_fn: self.classify_fn,
                    descriptor,
                    table: Arc::clone(&table),
                    progress: Arc::clone(&progress),
                    metrics: Arc::clone(&self.metrics),
                    token: token.clone(),
                    chunk: self.limits.classify_chunk.max(1),
                };
                tokio::spawn(task.run(request))
            })
            .collect();

        AggregationHandle {
            token,
            table,
            progress,
            tasks: Mutex::new(tasks),
            text_filter: text_filter.filter(|q| !q.is_empty()),
        }
    }

    /// Same as [`AggregationHandle::stop`].
    pub fn stop(&self, handle: &AggregationHandle) {
        handle.stop();
    }
}

#[derive(Debug)]
struct Progress {
    requested: usize,
    started: AtomicUsize,
    failed: AtomicUsize,
    pending: AtomicUsize,
}

impl Progress {
    fn new(requested: usize) -> Self {
        Self {
            requested,
            started: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            pending: AtomicUsize::new(requested),
        }
    }

    fn resolve(&self, outcome: Option<bool>) {
        match outcome {
            Some(true) => self.started.fetch_add(1, Ordering::Relaxed),
            Some(false) => self.failed.fetch_add(1, Ordering::Relaxed),
            None => 0,
        };
        self.pending.fetch_sub(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> AggregationProgress {
        AggregationProgress {
            requested: self.requested,
            started: self.started.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
        }
    }
}

/// A running aggregation. Dropping the handle stops it.
pub struct AggregationHandle {
    token: CancellationToken,
    table: Arc<Mutex<EntryTable>>,
    progress: Arc<Progress>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    text_filter: Option<String>,
}

impl AggregationHandle {
    /// Stop the run. Idempotent. The table is frozen before this returns;
    /// subscriptions are closed by their tasks shortly after.
    pub fn stop(&self) {
        let already = {
            let mut table = self.table.lock();
            let already = table.is_closed();
            table.close();
            already
        };
        self.token.cancel();
        if !already {
            info!(retained = self.retained(), "Aggregation stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for every source task to finish.
    pub async fn join(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Aggregation task failed");
            }
        }
    }

    /// Stop, then wait until every subscription is closed.
    pub async fn shutdown(&self) {
        self.stop();
        self.join().await;
    }

    pub fn text_filter(&self) -> Option<&str> {
        self.text_filter.as_deref()
    }

    /// Grouped view using the run's own text filter.
    pub fn snapshot(&self) -> Vec<AggregatedEntry> {
        self.snapshot_with(self.text_filter.as_deref())
    }

    /// Grouped view with an explicit query; the table is not modified.
    pub fn snapshot_with(&self, query: Option<&str>) -> Vec<AggregatedEntry> {
        let filter = FilterEngine::from_query(query);
        self.table.lock().snapshot(filter.as_ref())
    }

    /// Number of retained problem lines.
    pub fn retained(&self) -> usize {
        self.table.lock().len()
    }

    pub fn progress(&self) -> AggregationProgress {
        self.progress.snapshot()
    }
}

impl Drop for AggregationHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

struct SourceTask {
    source: Arc<dyn StreamSource>,
    classifier: Arc<ClassifierConfig>,
    classify_fn: ClassifyFn,
    descriptor: SourceDescriptor,
    table: Arc<Mutex<EntryTable>>,
    progress: Arc<Progress>,
    metrics: Arc<AggregatorMetrics>,
    token: CancellationToken,
    chunk: usize,
}

impl SourceTask {
    async fn run(self, request: StreamRequest) {
        let id = request.session_id.clone();

        let opened = tokio::select! {
            biased;
            _ = self.token.cancelled() => {
                self.progress.resolve(None);
                self.close(&id, false).await;
                return;
            }
            result = self.source.open_stream(request) => result,
        };

        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => {
                warn!(source = %self.descriptor.source_id, error = %e, "Skipping source: failed to start stream");
                self.progress.resolve(Some(false));
                self.metrics.record_stream_failed();
                return;
            }
        };
        self.progress.resolve(Some(true));
        self.metrics.record_stream_started();
        info!(source = %self.descriptor.source_id, session = %id, "Aggregation stream opened");

        self.ingest(std::mem::take(&mut stream.initial_lines)).await;

        loop {
            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                event = stream.events.recv() => match event {
                    Some(StreamEvent::Data(data)) => self.ingest(data.lines).await,
                    Some(StreamEvent::Ended) | None => {
                        debug!(source = %self.descriptor.source_id, "Aggregation stream ended");
                        self.token.cancelled().await;
                        break;
                    }
                },
            }
        }

        self.close(&id, true).await;
    }

    /// Classify a batch in chunks, yielding between chunks. A panic in
    /// classification drops the rest of the batch.
    async fn ingest(&self, lines: Vec<String>) {
        if lines.is_empty() || self.token.is_cancelled() {
            return;
        }
        self.metrics.record_batch(lines.len());

        for chunk in lines.chunks(self.chunk) {
            if self.token.is_cancelled() {
                return;
            }

            let classifier = self.classifier.as_ref();
            let classify_fn = self.classify_fn;
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                chunk
                    .iter()
                    .map(|line| classify_fn(line, classifier))
                    .filter(|parsed| parsed.level.is_problem())
                    .collect::<Vec<_>>()
            }));
            let problems = match outcome {
                Ok(problems) => problems,
                Err(_) => {
                    error!(
                        source = %self.descriptor.source_id,
                        lines = lines.len(),
                        "Classifier panicked; dropping batch"
                    );
                    self.metrics.record_panic();
                    return;
                }
            };

            if !problems.is_empty() {
                let received_at = Utc::now();
                let (mut retained, mut evicted) = (0, 0);
                {
                    let mut table = self.table.lock();
                    if table.is_closed() {
                        return;
                    }
                    for parsed in problems {
                        let (kept, dropped) = table.insert(&self.descriptor, parsed, received_at);
                        retained += usize::from(kept);
                        evicted += dropped;
                    }
                }
                self.metrics.record_retained(retained, evicted);
                debug!(source = %self.descriptor.source_id, retained, "Retained problem lines");
            }

            tokio::task::yield_now().await;
        }
    }

    async fn close(&self, id: &SessionId, was_open: bool) {
        match self.source.close_stream(id).await {
            Ok(()) => debug!(session = %id, "Aggregation stream closed"),
            Err(e) => debug!(session = %id, error = %e, "Aggregation stream close reported an error"),
        }
        self.metrics.record_stream_closed(was_open);
    }
}
