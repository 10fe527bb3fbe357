//! The transport capability the pipeline consumes.

use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::error::SourceError;
use crate::session::model::{LogTarget, SessionId};

/// Payload of a `log-data-<sessionId>` event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogData {
    pub lines: Vec<String>,
}

/// One message on an open subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Data(LogData),
    /// The remote stream finished; no more data follows.
    Ended,
}

/// Parameters for opening a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub session_id: SessionId,
    pub target: LogTarget,
    /// Container inside the target, `None` for the default one
    pub container: Option<String>,
    /// Number of historical lines to replay first
    pub tail_lines: Option<u64>,
    /// Only lines newer than this many seconds
    pub since_seconds: Option<u64>,
}

/// An accepted subscription.
#[derive(Debug)]
pub struct OpenedStream {
    /// Historical lines delivered with the open call
    pub initial_lines: Vec<String>,
    /// Containers the target offers, for container selection
    pub available_containers: Vec<String>,
    /// Push events for this session, in transport order
    pub events: mpsc::Receiver<StreamEvent>,
}

/// Event name carrying line batches for a session.
pub fn data_event_name(session_id: &SessionId) -> String {
    format!("log-data-{}", session_id)
}

/// Event name signalling the end of a session's stream.
pub fn ended_event_name(session_id: &SessionId) -> String {
    format!("log-ended-{}", session_id)
}

/// Source of log lines for sessions.
///
/// Object-safe thanks to `Pin<Box<…>>` returns, so drivers hold an
/// `Arc<dyn StreamSource>`.
pub trait StreamSource: Send + Sync {
    fn open_stream(
        &self,
        request: StreamRequest,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<OpenedStream, SourceError>> + Send + '_>>;

    /// Stop the subscription for `session_id`. Called once per opened
    /// subscription by the drivers in this crate.
    fn close_stream<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), SourceError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_embed_session_id() {
        let id = SessionId::from("errors-api-1");
        assert_eq!(data_event_name(&id), "log-data-errors-api-1");
        assert_eq!(ended_event_name(&id), "log-ended-errors-api-1");
    }
}
