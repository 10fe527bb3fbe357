use std::sync::Arc;

use tracing::info;

use crate::aggregate::{select_targets, since_seconds, AggregationHandle, Aggregator, PodInfo};
use crate::conf::PipelineConfig;
use crate::parser::ClassifierConfig;
use crate::session::{LogSessionSpec, LogTail, SessionId, SessionRegistry};
use crate::source::StreamSource;
use crate::viewer::WindowedViewer;

/// Everything a front end needs, built from one [`PipelineConfig`].
pub struct PipelineState {
    pub config: PipelineConfig,
    pub classifier: Arc<ClassifierConfig>,
    pub registry: Arc<SessionRegistry>,
    pub tail: LogTail,
    pub aggregator: Aggregator,
}

impl PipelineState {
    pub fn new(config: PipelineConfig, source: Arc<dyn StreamSource>) -> Self {
        let classifier = config.classifier_config();
        let registry = Arc::new(SessionRegistry::new(config.max_buffer_lines));
        let tail = LogTail::new(Arc::clone(&registry), Arc::clone(&source), config.tail_lines);
        let aggregator = Aggregator::new(source, Arc::clone(&classifier))
            .with_limits(config.aggregator_limits());

        Self { config, classifier, registry, tail, aggregator }
    }

    /// Open a streaming log session with a viewer attached.
    pub fn open_logs(&self, spec: LogSessionSpec) -> (SessionId, WindowedViewer) {
        let id = self.tail.open(spec);
        let viewer = self.viewer(id.clone());
        (id, viewer)
    }

    pub fn viewer(&self, id: SessionId) -> WindowedViewer {
        WindowedViewer::new(id, Arc::clone(&self.classifier), self.config.viewer_options())
    }

    /// Aggregate errors over the running pods of `pods`, optionally one
    /// workload, looking back `minutes` (`0` for all time).
    pub fn start_aggregation(
        &self,
        pods: &[PodInfo],
        workload: Option<&str>,
        minutes: u64,
        text_filter: Option<String>,
    ) -> AggregationHandle {
        let targets = select_targets(pods, workload, self.config.max_concurrent_streams);
        self.aggregator.start(targets, since_seconds(minutes), text_filter)
    }

    /// Close every session and wait for their streams to stop.
    pub async fn shutdown(&self) {
        self.tail.shutdown().await;
        info!("Pipeline shut down");
    }
}

pub type SharedState = Arc<PipelineState>;
