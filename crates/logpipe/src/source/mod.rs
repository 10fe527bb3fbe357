//! Source module: the boundary with the external line transport.
//!
//! The core only needs two capabilities from a transport: open a push
//! subscription for a session, and close it. [`StreamSource`] captures
//! them; [`fake::FakeSource`] is the in-memory double used by tests.

pub mod error;
pub mod fake;
pub mod traits;

pub use error::SourceError;
pub use traits::{
    data_event_name, ended_event_name, LogData, OpenedStream, StreamEvent, StreamRequest,
    StreamSource,
};
