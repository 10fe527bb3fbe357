//! Fake: test double for the line transport.
//!
//! Provides a deterministic [`FakeSource`] that implements [`StreamSource`]
//! using in-memory state. Tests push batches and end streams by hand, and
//! inspect which subscriptions were opened and how often each was closed.

use std::collections::HashMap;
use std::pin::Pin;

use tokio::sync::{mpsc, watch, Mutex};

use super::error::SourceError;
use super::traits::{LogData, OpenedStream, StreamEvent, StreamRequest, StreamSource};
use crate::session::model::SessionId;

const CHANNEL_CAPACITY: usize = 256;

// ── In-memory state ─────────────────────────────────────────────

/// A canned target for the fake store.
#[derive(Clone, Debug, Default)]
pub struct FakeTarget {
    pub containers: Vec<String>,
    pub initial_lines: Vec<String>,
    /// When set, opening a stream on this target fails with this message
    pub fail: Option<String>,
}

#[derive(Default)]
struct Inner {
    targets: HashMap<String, FakeTarget>,
    senders: HashMap<SessionId, mpsc::Sender<StreamEvent>>,
    requests: Vec<StreamRequest>,
    closes: HashMap<SessionId, usize>,
}

/// A fake transport for deterministic testing.
pub struct FakeSource {
    inner: Mutex<Inner>,
    gate: watch::Sender<bool>,
}

impl FakeSource {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self { inner: Mutex::new(Inner::default()), gate }
    }

    /// Seed a target by name.
    pub async fn add_target(&self, name: &str, target: FakeTarget) {
        self.inner.lock().await.targets.insert(name.to_string(), target);
    }

    /// Park every subsequent `open_stream` call until [`Self::release_opens`].
    pub fn hold_opens(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_opens(&self) {
        self.gate.send_replace(true);
    }

    /// Deliver a batch to an open subscription. Returns `false` when the
    /// session has no live subscription.
    pub async fn push_lines<I, S>(&self, session_id: &SessionId, lines: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines.into_iter().map(Into::into).collect();
        self.send(session_id, StreamEvent::Data(LogData { lines })).await
    }

    /// Signal the end of a subscription's stream.
    pub async fn end_stream(&self, session_id: &SessionId) -> bool {
        self.send(session_id, StreamEvent::Ended).await
    }

    async fn send(&self, session_id: &SessionId, event: StreamEvent) -> bool {
        let sender = self.inner.lock().await.senders.get(session_id).cloned();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Every request received, in arrival order.
    pub async fn requests(&self) -> Vec<StreamRequest> {
        self.inner.lock().await.requests.clone()
    }

    /// Session ids of every open attempt on `target`, in arrival order.
    pub async fn sessions_for(&self, target: &str) -> Vec<SessionId> {
        let state = self.inner.lock().await;
        state
            .requests
            .iter()
            .filter(|r| r.target.name == target)
            .map(|r| r.session_id.clone())
            .collect()
    }

    /// How many times `close_stream` was called for a session.
    pub async fn close_count(&self, session_id: &SessionId) -> usize {
        self.inner.lock().await.closes.get(session_id).copied().unwrap_or(0)
    }

    /// Number of subscriptions currently open.
    pub async fn open_count(&self) -> usize {
        self.inner.lock().await.senders.len()
    }
}

impl Default for FakeSource {
    fn default() -> Self {
        Self::new()
    }
}

// ── StreamSource implementation ─────────────────────────────────

impl StreamSource for FakeSource {
    fn open_stream(
        &self,
        request: StreamRequest,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<OpenedStream, SourceError>> + Send + '_>> {
        Box::pin(async move {
            self.inner.lock().await.requests.push(request.clone());

            let mut gate = self.gate.subscribe();
            if gate.wait_for(|open| *open).await.is_err() {
                return Err(SourceError::Unavailable("fake source dropped".to_string()));
            }

            let mut state = self.inner.lock().await;
            let target = state
                .targets
                .get(&request.target.name)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(request.target.name.clone()))?;
            if let Some(message) = target.fail {
                return Err(SourceError::Unavailable(message));
            }

            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            state.senders.insert(request.session_id.clone(), tx);

            Ok(OpenedStream {
                initial_lines: target.initial_lines,
                available_containers: target.containers,
                events: rx,
            })
        })
    }

    fn close_stream<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.inner.lock().await;
            *state.closes.entry(session_id.clone()).or_insert(0) += 1;
            match state.senders.remove(session_id) {
                Some(_) => Ok(()),
                None => Err(SourceError::Closed(session_id.to_string())),
            }
        })
    }
}
