//! Viewer module: the windowed, filterable projection of a log session.
//!
//! [`WindowedViewer`] keeps an incremental classification cache keyed by
//! line sequence number, so each refresh only classifies what arrived
//! since the last one.

pub mod highlight;
pub mod model;
pub mod window;

pub use highlight::{highlight_markup, unescape_html};
pub use model::{
    anchor_scroll_top, compact_count, LevelChip, LevelCounts, Projection, RenderedLine,
    ScrollAction, ScrollMetrics, ViewerOptions,
};
pub use window::WindowedViewer;
