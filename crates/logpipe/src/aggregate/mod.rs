//! Aggregate module: error/warning roll-up across many sources.
//!
//! [`Aggregator::start`] opens one subscription per source and feeds
//! problem lines into a bounded [`EntryTable`]. Reads dedup the table on
//! demand, so the retained lines stay the single source of truth.

pub mod driver;
pub mod metrics;
pub mod model;
pub mod select;
pub mod table;

pub use driver::{AggregationHandle, Aggregator, AggregatorLimits};
pub use metrics::{AggregatorMetrics, AggregatorMetricsSnapshot};
pub use model::{AggregatedEntry, AggregationProgress, PodInfo, SourceDescriptor};
pub use select::{select_targets, since_seconds, workloads, TimeRange, TIME_RANGES};
pub use table::EntryTable;
