// Module structure for the logpipe log observability core.

// Core infrastructure
pub mod conf;
pub mod filter;
pub mod parser;
pub mod runtime;
pub mod source;
pub mod state;

// Domain modules
pub mod session;
pub mod aggregate;
pub mod viewer;

pub use conf::PipelineConfig;
pub use parser::{classify, ClassifierConfig, LogLevel, ParsedLine};
pub use session::{LogTail, SessionId, SessionRegistry};
pub use aggregate::{Aggregator, AggregationHandle};
pub use state::{PipelineState, SharedState};
pub use viewer::WindowedViewer;
