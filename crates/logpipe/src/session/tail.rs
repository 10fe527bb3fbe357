//! Log tail driver.
//!
//! Binds each registry log session to a subscription on the
//! [`StreamSource`]. One tokio task per session; the registry's stream
//! token tells the task when to tear down, and the task calls
//! `close_stream` exactly once on the way out.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::model::{LogSessionSpec, LogTarget, SessionId};
use super::registry::SessionRegistry;
use crate::source::{OpenedStream, StreamEvent, StreamRequest, StreamSource};

pub const DEFAULT_TAIL_LINES: u64 = 500;

pub struct LogTail {
    registry: Arc<SessionRegistry>,
    source: Arc<dyn StreamSource>,
    tail_lines: u64,
    tasks: DashMap<SessionId, JoinHandle<()>>,
}

impl LogTail {
    pub fn new(registry: Arc<SessionRegistry>, source: Arc<dyn StreamSource>, tail_lines: u64) -> Self {
        Self { registry, source, tail_lines, tasks: DashMap::new() }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Open a log session and start streaming into it. Returns at once;
    /// must be called from within a tokio runtime.
    pub fn open(&self, spec: LogSessionSpec) -> SessionId {
        let id = self.registry.open_log_session(spec);
        self.attach(&id);
        id
    }

    /// Start the subscription for an existing log session. Returns `false`
    /// for unknown ids and for sessions that already have a live task.
    pub fn attach(&self, id: &SessionId) -> bool {
        self.reap_finished();
        if self.tasks.contains_key(id) {
            return false;
        }
        let (Some(token), Some((target, container))) =
            (self.registry.stream_token(id), self.registry.stream_target(id))
        else {
            return false;
        };

        let request = StreamRequest {
            session_id: id.clone(),
            target,
            container,
            tail_lines: Some(self.tail_lines),
            since_seconds: None,
        };
        let handle = tokio::spawn(run_tail(
            Arc::clone(&self.registry),
            Arc::clone(&self.source),
            request,
            token,
        ));
        self.tasks.insert(id.clone(), handle);
        true
    }

    /// Point a log session at another container: the old subscription is
    /// torn down, the buffer emptied, and a new subscription opened.
    pub async fn switch_container(&self, id: &SessionId, container: Option<String>) -> bool {
        if self.registry.restart_stream(id).is_none() {
            return false;
        }
        self.join_task(id).await;
        if !self.registry.begin_container_switch(id, container) {
            return false;
        }
        self.attach(id)
    }

    /// Close a session and wait for its subscription to be torn down.
    pub async fn close(&self, id: &SessionId) -> bool {
        let closed = self.registry.close(id);
        self.join_task(id).await;
        closed
    }

    /// Close every session and wait for all subscriptions to finish.
    pub async fn shutdown(&self) {
        let closed = self.registry.close_all();
        let ids: Vec<SessionId> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            self.join_task(id).await;
        }
        info!(sessions = closed, "Log tail shut down");
    }

    /// Number of subscription tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.tasks.iter().filter(|e| !e.value().is_finished()).count()
    }

    async fn join_task(&self, id: &SessionId) {
        if let Some((_, handle)) = self.tasks.remove(id) {
            if let Err(e) = handle.await {
                warn!(session = %id, error = %e, "Log tail task failed");
            }
        }
    }

    fn reap_finished(&self) {
        self.tasks.retain(|_, handle| !handle.is_finished());
    }
}

async fn run_tail(
    registry: Arc<SessionRegistry>,
    source: Arc<dyn StreamSource>,
    request: StreamRequest,
    token: CancellationToken,
) {
    let id = request.session_id.clone();
    let target = request.target.clone();

    let opened = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(session = %id, "Cancelled while opening log stream");
            close_stream(source.as_ref(), &id).await;
            return;
        }
        result = source.open_stream(request) => result,
    };

    match opened {
        Ok(stream) => pump(&registry, &id, &target, stream, &token).await,
        Err(e) => {
            warn!(session = %id, target = %target, error = %e, "Failed to start log stream");
            if !token.is_cancelled() {
                registry.append(&id, [format!("[Error starting log stream: {}]", e)]);
                registry.set_streaming(&id, false);
            }
            token.cancelled().await;
        }
    }

    close_stream(source.as_ref(), &id).await;
}

/// Feed an opened stream into the registry until the token is cancelled.
async fn pump(
    registry: &SessionRegistry,
    id: &SessionId,
    target: &LogTarget,
    mut stream: OpenedStream,
    token: &CancellationToken,
) {
    info!(session = %id, target = %target, "Log stream opened");

    if !token.is_cancelled() {
        registry.append(id, std::mem::take(&mut stream.initial_lines));
        registry.set_available_containers(id, std::mem::take(&mut stream.available_containers));
    }

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            event = stream.events.recv() => match event {
                Some(StreamEvent::Data(data)) => {
                    let appended = registry.append(id, data.lines);
                    debug!(session = %id, lines = appended, "Appended log batch");
                }
                Some(StreamEvent::Ended) | None => {
                    debug!(session = %id, "Log stream ended");
                    registry.set_streaming(id, false);
                    token.cancelled().await;
                    break;
                }
            },
        }
    }
}

async fn close_stream(source: &dyn StreamSource, id: &SessionId) {
    match source.close_stream(id).await {
        Ok(()) => info!(session = %id, "Log stream closed"),
        Err(e) => debug!(session = %id, error = %e, "Log stream close reported an error"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::model::{LogTarget, TargetKind};
    use crate::source::fake::{FakeSource, FakeTarget};

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    async fn setup() -> (Arc<FakeSource>, LogTail) {
        let fake = Arc::new(FakeSource::new());
        fake.add_target(
            "api-0",
            FakeTarget {
                containers: vec!["app".into(), "sidecar".into()],
                initial_lines: vec!["boot 1".into(), "boot 2".into()],
                fail: None,
            },
        )
        .await;
        let registry = Arc::new(SessionRegistry::new(100));
        let source: Arc<dyn StreamSource> = fake.clone();
        (fake, LogTail::new(registry, source, 200))
    }

    fn spec(name: &str) -> LogSessionSpec {
        LogSessionSpec::new(LogTarget::new(TargetKind::Pod, name))
    }

    fn texts(tail: &LogTail, id: &SessionId) -> Vec<String> {
        tail.registry().lines(id).unwrap_or_default().iter().map(|l| l.to_string()).collect()
    }

    #[tokio::test]
    async fn streams_initial_and_pushed_lines() {
        let (fake, tail) = setup().await;
        let id = tail.open(spec("api-0"));

        wait_until(|| texts(&tail, &id).len() == 2).await;
        let view = tail.registry().session(&id).unwrap().log.unwrap();
        assert_eq!(view.available_containers, vec!["app", "sidecar"]);

        let requests = fake.requests().await;
        assert_eq!(requests[0].tail_lines, Some(200));
        assert_eq!(requests[0].container, None);

        assert!(fake.push_lines(&id, ["live 1", "live 2"]).await);
        wait_until(|| texts(&tail, &id).len() == 4).await;
        assert_eq!(texts(&tail, &id), vec!["boot 1", "boot 2", "live 1", "live 2"]);
    }

    #[tokio::test]
    async fn end_of_stream_marks_not_streaming() {
        let (fake, tail) = setup().await;
        let id = tail.open(spec("api-0"));
        wait_until(|| texts(&tail, &id).len() == 2).await;

        assert!(fake.end_stream(&id).await);
        wait_until(|| !tail.registry().session(&id).unwrap().log.unwrap().is_streaming).await;
        assert_eq!(fake.close_count(&id).await, 0);

        assert!(tail.close(&id).await);
        assert_eq!(fake.close_count(&id).await, 1);
    }

    #[tokio::test]
    async fn failed_open_reports_into_buffer() {
        let (fake, tail) = setup().await;
        let id = tail.open(spec("missing"));

        wait_until(|| !texts(&tail, &id).is_empty()).await;
        assert_eq!(
            texts(&tail, &id),
            vec!["[Error starting log stream: Target not found: missing]"]
        );
        assert!(!tail.registry().session(&id).unwrap().log.unwrap().is_streaming);
        assert_eq!(fake.close_count(&id).await, 0);

        assert!(tail.close(&id).await);
        assert_eq!(fake.close_count(&id).await, 1);
        assert_eq!(tail.active_tasks(), 0);
    }

    #[tokio::test]
    async fn close_tears_down_exactly_once() {
        let (fake, tail) = setup().await;
        let id = tail.open(spec("api-0"));
        wait_until(|| texts(&tail, &id).len() == 2).await;

        assert!(tail.close(&id).await);
        assert!(!tail.close(&id).await);
        assert_eq!(fake.close_count(&id).await, 1);
        assert!(!fake.push_lines(&id, ["late"]).await);
        assert!(tail.registry().lines(&id).is_none());
        assert_eq!(tail.active_tasks(), 0);
    }

    #[tokio::test]
    async fn close_during_open_still_tears_down() {
        let (fake, tail) = setup().await;
        fake.hold_opens();
        let id = tail.open(spec("api-0"));
        wait_until(|| tail.registry().contains(&id)).await;

        assert!(tail.close(&id).await);
        fake.release_opens();
        assert_eq!(fake.close_count(&id).await, 1);
        assert_eq!(fake.open_count().await, 0);
    }

    #[tokio::test]
    async fn registry_close_alone_stops_the_task() {
        let (fake, tail) = setup().await;
        let id = tail.open(spec("api-0"));
        wait_until(|| texts(&tail, &id).len() == 2).await;

        tail.registry().close(&id);
        wait_until(|| tail.active_tasks() == 0).await;
        assert_eq!(fake.close_count(&id).await, 1);
    }

    #[tokio::test]
    async fn switch_container_restarts_subscription() {
        let (fake, tail) = setup().await;
        let id = tail.open(spec("api-0"));
        wait_until(|| texts(&tail, &id).len() == 2).await;
        tail.registry().set_streaming(&id, false);

        assert!(tail.switch_container(&id, Some("sidecar".into())).await);
        assert_eq!(fake.close_count(&id).await, 1);

        wait_until(|| texts(&tail, &id).len() == 2).await;
        let view = tail.registry().session(&id).unwrap().log.unwrap();
        assert_eq!(view.selected_container.as_deref(), Some("sidecar"));
        assert!(view.is_streaming);

        let requests = fake.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].container.as_deref(), Some("sidecar"));

        assert!(fake.push_lines(&id, ["from sidecar"]).await);
        wait_until(|| texts(&tail, &id).len() == 3).await;

        tail.shutdown().await;
        assert_eq!(fake.close_count(&id).await, 2);
        assert!(tail.registry().is_empty());
    }

    #[tokio::test]
    async fn switch_container_on_unknown_session() {
        let (_fake, tail) = setup().await;
        assert!(!tail.switch_container(&SessionId::from("ghost"), None).await);
    }
}
