//! Session module: the registry of open log, shell, and terminal tabs.
//!
//! [`SessionRegistry`] owns every session and its bounded line buffer.
//! [`LogTail`] drives the subscription behind each log session.

pub mod buffer;
pub mod model;
pub mod registry;
pub mod tail;

pub use buffer::{LineBuffer, LinesDelta};
pub use model::{
    InteractiveTarget, LogSessionSpec, LogTarget, SessionId, SessionKind, SessionView, TargetKind,
};
pub use registry::SessionRegistry;
pub use tail::LogTail;
