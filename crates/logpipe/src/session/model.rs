use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, unique session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Arc<str>);

impl SessionId {
    /// A fresh random id.
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// An id with a readable prefix, e.g. `errors-api-7f3c9a1e`.
    pub fn with_prefix(prefix: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(Arc::from(format!("{}-{}", prefix, &suffix[..8])))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Logs,
    Shell,
    Terminal,
}

/// Kind of resource a log stream reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Pod,
    Deployment,
    StatefulSet,
    DaemonSet,
    Job,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Pod => "pod",
            TargetKind::Deployment => "deployment",
            TargetKind::StatefulSet => "statefulset",
            TargetKind::DaemonSet => "daemonset",
            TargetKind::Job => "job",
        }
    }
}

/// What a log session streams from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogTarget {
    pub kind: TargetKind,
    pub name: String,
}

impl LogTarget {
    pub fn new(kind: TargetKind, name: impl Into<String>) -> Self {
        Self { kind, name: name.into() }
    }
}

impl fmt::Display for LogTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.name)
    }
}

/// Request to open a log session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSessionSpec {
    pub target: LogTarget,
    pub title: String,
    pub container: Option<String>,
}

impl LogSessionSpec {
    pub fn new(target: LogTarget) -> Self {
        let title = target.name.clone();
        Self { target, title, container: None }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }
}

/// Request to open a shell or terminal tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InteractiveTarget {
    Shell {
        pod_name: String,
        container_name: Option<String>,
        context: Option<String>,
        namespace: Option<String>,
        title: Option<String>,
    },
    Terminal {
        context: Option<String>,
        namespace: Option<String>,
    },
}

impl InteractiveTarget {
    pub fn kind(&self) -> SessionKind {
        match self {
            InteractiveTarget::Shell { .. } => SessionKind::Shell,
            InteractiveTarget::Terminal { .. } => SessionKind::Terminal,
        }
    }
}

/// Per-session log state, minus the lines themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogView {
    pub target: LogTarget,
    pub is_following: bool,
    pub is_streaming: bool,
    pub search_query: String,
    pub selected_container: Option<String>,
    pub available_containers: Vec<String>,
    pub line_count: usize,
}

/// Point-in-time projection of a session for readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub id: SessionId,
    pub kind: SessionKind,
    pub title: String,
    /// Present for log sessions only
    pub log: Option<LogView>,
    /// Present for shell and terminal sessions only
    pub interactive: Option<InteractiveTarget>,
}
