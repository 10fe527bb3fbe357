use thiserror::Error;

/// Failures reported by a [`super::StreamSource`].
///
/// The core never propagates these to its callers: a failed open is
/// skipped or turned into a not-streaming session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("Target not found: {0}")]
    NotFound(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Stream already closed: {0}")]
    Closed(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
