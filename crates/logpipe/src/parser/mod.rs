/// Line classification module
///
/// Turns one raw log line (ANSI escapes and all) into a [`ParsedLine`]:
/// a canonical level, an optional timestamp and a best-effort message.
///
/// # Architecture
///
/// - `ansi.rs`: escape sequence stripping and SGR → markup rendering
/// - `level.rs`: canonical levels and the fixed text token groups
/// - `config.rs`: caller-supplied JSON field list and alias mapping
/// - `timestamp.rs`: timestamp extraction, normalization, instant parsing
/// - `classify.rs`: the JSON path / text path orchestrator
///
/// Classification never fails: anything it cannot resolve becomes
/// `LogLevel::Unknown` or an absent timestamp.

pub mod ansi;
pub mod classify;
pub mod config;
pub mod level;
pub mod model;
pub mod timestamp;

pub use ansi::{escape_html, render_ansi, strip_ansi_codes};
pub use classify::classify;
pub use config::ClassifierConfig;
pub use level::LogLevel;
pub use model::ParsedLine;
