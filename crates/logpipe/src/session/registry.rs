//! The session registry.
//!
//! One synchronous lock guards every session, so each operation is atomic
//! with respect to the others. Setters on unknown ids are no-ops; a late
//! batch for a closed session is simply dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::buffer::{LineBuffer, LinesDelta};
use super::model::{
    InteractiveTarget, LogSessionSpec, LogTarget, LogView, SessionId, SessionKind, SessionView,
};

pub const DEFAULT_MAX_LINES: usize = 50_000;
const TERMINAL_CONTEXT_CHARS: usize = 20;

#[derive(Debug)]
struct LogState {
    target: LogTarget,
    buffer: LineBuffer,
    is_following: bool,
    is_streaming: bool,
    search_query: String,
    selected_container: Option<String>,
    available_containers: Vec<String>,
}

#[derive(Debug)]
enum Body {
    Logs(LogState),
    Interactive(InteractiveTarget),
}

#[derive(Debug)]
struct Session {
    title: String,
    body: Body,
    /// Cancelled once, when the session is closed
    lifetime: CancellationToken,
    /// Child of `lifetime`; replaced on every subscription restart
    stream: CancellationToken,
}

impl Session {
    fn new(title: String, body: Body) -> Self {
        let lifetime = CancellationToken::new();
        let stream = lifetime.child_token();
        Self { title, body, lifetime, stream }
    }

    fn kind(&self) -> SessionKind {
        match &self.body {
            Body::Logs(_) => SessionKind::Logs,
            Body::Interactive(target) => target.kind(),
        }
    }

    fn logs_mut(&mut self) -> Option<&mut LogState> {
        match &mut self.body {
            Body::Logs(state) => Some(state),
            Body::Interactive(_) => None,
        }
    }

    fn logs(&self) -> Option<&LogState> {
        match &self.body {
            Body::Logs(state) => Some(state),
            Body::Interactive(_) => None,
        }
    }

    fn view(&self, id: &SessionId) -> SessionView {
        let (log, interactive) = match &self.body {
            Body::Logs(state) => (
                Some(LogView {
                    target: state.target.clone(),
                    is_following: state.is_following,
                    is_streaming: state.is_streaming,
                    search_query: state.search_query.clone(),
                    selected_container: state.selected_container.clone(),
                    available_containers: state.available_containers.clone(),
                    line_count: state.buffer.len(),
                }),
                None,
            ),
            Body::Interactive(target) => (None, Some(target.clone())),
        };
        SessionView { id: id.clone(), kind: self.kind(), title: self.title.clone(), log, interactive }
    }
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, Session>,
    /// Open order, oldest first
    order: Vec<SessionId>,
    active: Option<SessionId>,
    is_open: bool,
}

impl Inner {
    fn insert(&mut self, id: SessionId, session: Session) {
        self.sessions.insert(id.clone(), session);
        self.order.push(id.clone());
        self.active = Some(id);
        self.is_open = true;
    }

    fn logs_mut(&mut self, id: &SessionId) -> Option<&mut LogState> {
        self.sessions.get_mut(id).and_then(Session::logs_mut)
    }
}

/// Owns every open session and its line buffer.
#[derive(Debug)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
    max_lines: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINES)
    }
}

impl SessionRegistry {
    pub fn new(max_lines: usize) -> Self {
        Self { inner: RwLock::new(Inner::default()), max_lines: max_lines.max(1) }
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Register a log session. It starts following and streaming with an
    /// empty buffer, and becomes the active session.
    pub fn open_log_session(&self, spec: LogSessionSpec) -> SessionId {
        let id = SessionId::generate();
        let state = LogState {
            target: spec.target,
            buffer: LineBuffer::new(self.max_lines),
            is_following: true,
            is_streaming: true,
            search_query: String::new(),
            selected_container: spec.container,
            available_containers: Vec::new(),
        };
        self.inner.write().insert(id.clone(), Session::new(spec.title, Body::Logs(state)));
        debug!(session = %id, "Opened log session");
        id
    }

    /// Register a shell or terminal session and make it active.
    pub fn open_interactive_session(&self, target: InteractiveTarget) -> SessionId {
        let id = SessionId::generate();
        let mut inner = self.inner.write();
        let title = match &target {
            InteractiveTarget::Shell { pod_name, title, .. } => {
                title.clone().unwrap_or_else(|| pod_name.clone())
            }
            InteractiveTarget::Terminal { context, .. } => {
                let n = inner
                    .sessions
                    .values()
                    .filter(|s| s.kind() == SessionKind::Terminal)
                    .count()
                    + 1;
                terminal_title(n, context.as_deref())
            }
        };
        inner.insert(id.clone(), Session::new(title, Body::Interactive(target)));
        debug!(session = %id, "Opened interactive session");
        id
    }

    /// Remove a session and cancel its token. Returns `false` for unknown
    /// ids, so the cancellation happens at most once per session.
    pub fn close(&self, id: &SessionId) -> bool {
        let mut inner = self.inner.write();
        let Some(session) = inner.sessions.remove(id) else {
            return false;
        };
        session.lifetime.cancel();
        inner.order.retain(|s| s != id);
        if inner.active.as_ref() == Some(id) {
            inner.active = inner.order.last().cloned();
        }
        inner.is_open = !inner.order.is_empty();
        debug!(session = %id, "Closed session");
        true
    }

    /// Close every session, newest first.
    pub fn close_all(&self) -> usize {
        let ids: Vec<SessionId> = self.inner.read().order.iter().rev().cloned().collect();
        ids.iter().filter(|id| self.close(id)).count()
    }

    // ── Panel state ─────────────────────────────────────────────

    pub fn set_active(&self, id: &SessionId) {
        let mut inner = self.inner.write();
        if inner.sessions.contains_key(id) {
            inner.active = Some(id.clone());
        }
    }

    pub fn active(&self) -> Option<SessionId> {
        self.inner.read().active.clone()
    }

    pub fn active_session(&self) -> Option<SessionView> {
        let inner = self.inner.read();
        let id = inner.active.as_ref()?;
        inner.sessions.get(id).map(|s| s.view(id))
    }

    pub fn is_open(&self) -> bool {
        self.inner.read().is_open
    }

    pub fn toggle_panel(&self) -> bool {
        let mut inner = self.inner.write();
        inner.is_open = !inner.is_open;
        inner.is_open
    }

    // ── Buffer mutation ─────────────────────────────────────────

    /// Append a batch to a log session's buffer. Returns the number of
    /// lines appended (zero for unknown or non-log sessions).
    pub fn append<I>(&self, id: &SessionId, lines: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Arc<str>>,
    {
        let mut inner = self.inner.write();
        let Some(state) = inner.logs_mut(id) else {
            return 0;
        };
        let before = state.buffer.next_seq();
        let evicted = state.buffer.extend(lines);
        let appended = (state.buffer.next_seq() - before) as usize;
        if evicted > 0 {
            debug!(session = %id, evicted, "Evicted oldest lines");
        }
        appended
    }

    /// Empty a session's buffer. Flags are untouched.
    pub fn clear(&self, id: &SessionId) {
        if let Some(state) = self.inner.write().logs_mut(id) {
            state.buffer.clear();
        }
    }

    pub fn set_following(&self, id: &SessionId, following: bool) {
        if let Some(state) = self.inner.write().logs_mut(id) {
            state.is_following = following;
        }
    }

    pub fn set_streaming(&self, id: &SessionId, streaming: bool) {
        if let Some(state) = self.inner.write().logs_mut(id) {
            state.is_streaming = streaming;
        }
    }

    pub fn set_search_query(&self, id: &SessionId, query: impl Into<String>) {
        if let Some(state) = self.inner.write().logs_mut(id) {
            state.search_query = query.into();
        }
    }

    pub fn set_selected_container(&self, id: &SessionId, container: Option<String>) {
        if let Some(state) = self.inner.write().logs_mut(id) {
            state.selected_container = container;
        }
    }

    pub fn set_available_containers(&self, id: &SessionId, containers: Vec<String>) {
        if let Some(state) = self.inner.write().logs_mut(id) {
            state.available_containers = containers;
        }
    }

    /// Prepare a log session for a new container: empty the buffer, select
    /// the container, mark it streaming. All in one step.
    pub fn begin_container_switch(&self, id: &SessionId, container: Option<String>) -> bool {
        let mut inner = self.inner.write();
        let Some(state) = inner.logs_mut(id) else {
            return false;
        };
        state.buffer.clear();
        state.selected_container = container;
        state.is_streaming = true;
        true
    }

    // ── Cancellation ────────────────────────────────────────────

    /// Token cancelled when the session closes.
    pub fn lifetime_token(&self, id: &SessionId) -> Option<CancellationToken> {
        self.inner.read().sessions.get(id).map(|s| s.lifetime.clone())
    }

    /// Token for the session's current subscription.
    pub fn stream_token(&self, id: &SessionId) -> Option<CancellationToken> {
        self.inner.read().sessions.get(id).map(|s| s.stream.clone())
    }

    /// Cancel the current subscription token and install a fresh one.
    pub fn restart_stream(&self, id: &SessionId) -> Option<CancellationToken> {
        let mut inner = self.inner.write();
        let session = inner.sessions.get_mut(id)?;
        session.stream.cancel();
        session.stream = session.lifetime.child_token();
        Some(session.stream.clone())
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.inner.read().sessions.contains_key(id)
    }

    pub fn session(&self, id: &SessionId) -> Option<SessionView> {
        self.inner.read().sessions.get(id).map(|s| s.view(id))
    }

    /// Every session in open order.
    pub fn sessions(&self) -> Vec<SessionView> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.sessions.get(id).map(|s| s.view(id)))
            .collect()
    }

    /// The log target and selected container, for (re)opening a stream.
    pub fn stream_target(&self, id: &SessionId) -> Option<(LogTarget, Option<String>)> {
        let inner = self.inner.read();
        let state = inner.sessions.get(id)?.logs()?;
        Some((state.target.clone(), state.selected_container.clone()))
    }

    /// All retained lines, oldest first.
    pub fn lines(&self, id: &SessionId) -> Option<Vec<Arc<str>>> {
        let inner = self.inner.read();
        let state = inner.sessions.get(id)?.logs()?;
        Some(state.buffer.iter().cloned().collect())
    }

    /// Retained lines with sequence number `>= seq`.
    pub fn lines_since(&self, id: &SessionId, seq: u64) -> Option<LinesDelta> {
        let inner = self.inner.read();
        let state = inner.sessions.get(id)?.logs()?;
        Some(state.buffer.since(seq))
    }
}

fn terminal_title(n: usize, context: Option<&str>) -> String {
    match context.filter(|c| !c.is_empty()) {
        Some(ctx) => {
            let chars = ctx.chars().count();
            let short: String = ctx.chars().skip(chars.saturating_sub(TERMINAL_CONTEXT_CHARS)).collect();
            format!("Terminal {} ({})", n, short)
        }
        None => format!("Terminal {}", n),
    }
}
