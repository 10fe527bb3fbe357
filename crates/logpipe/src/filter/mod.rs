//! Filter module: case-insensitive search over log text.

pub mod engine;

pub use engine::{FilterEngine, FilterError};
