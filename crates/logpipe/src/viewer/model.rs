use serde::Serialize;

use crate::parser::LogLevel;

pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_FOLLOW_TOLERANCE_PX: f64 = 30.0;
pub const DEFAULT_LOAD_MORE_THRESHOLD_PX: f64 = 50.0;

pub const WAITING_HINT: &str = "Waiting for logs...";
pub const EMPTY_HINT: &str = "No log output";

/// Tunables for a [`super::WindowedViewer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerOptions {
    /// Initial window, and the step when loading more
    pub page_size: usize,
    /// Distance from the bottom still counted as "at the bottom"
    pub follow_tolerance_px: f64,
    /// Distance from the top that triggers loading more
    pub load_more_threshold_px: f64,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            follow_tolerance_px: DEFAULT_FOLLOW_TOLERANCE_PX,
            load_more_threshold_px: DEFAULT_LOAD_MORE_THRESHOLD_PX,
        }
    }
}

/// Lines per level over the whole (unfiltered) buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts([usize; 6]);

impl LevelCounts {
    pub fn get(&self, level: LogLevel) -> usize {
        self.0[level.index()]
    }

    pub fn increment(&mut self, level: LogLevel) {
        self.0[level.index()] += 1;
    }

    pub fn decrement(&mut self, level: LogLevel) {
        let slot = &mut self.0[level.index()];
        *slot = slot.saturating_sub(1);
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }
}

/// `1234` → `"1k"`; counts up to 999 are shown as-is.
pub fn compact_count(count: usize) -> String {
    if count > 999 {
        format!("{}k", count / 1000)
    } else {
        count.to_string()
    }
}

/// A level toggle as shown above the lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelChip {
    pub level: LogLevel,
    pub label: &'static str,
    pub count: usize,
    /// Compact count, absent when zero
    pub display_count: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedLine {
    pub seq: u64,
    pub level: LogLevel,
    /// Rendered markup with search highlighting applied
    pub html: String,
}

/// Scroll position reported by the display surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn distance_from_bottom(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// What the display surface should do with its scroll position after the
/// next render.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum ScrollAction {
    #[default]
    None,
    ScrollToBottom,
    /// Keep the previously visible lines in place after older lines were
    /// prepended.
    RestoreAnchor { previous_height: f64, previous_top: f64 },
}

impl ScrollAction {
    /// Target `scroll_top` once the new content height is known.
    pub fn resolve(&self, new_height: f64) -> Option<f64> {
        match *self {
            ScrollAction::None => None,
            ScrollAction::ScrollToBottom => Some(new_height),
            ScrollAction::RestoreAnchor { previous_height, previous_top } => {
                Some(anchor_scroll_top(previous_height, previous_top, new_height))
            }
        }
    }
}

pub fn anchor_scroll_top(previous_height: f64, previous_top: f64, new_height: f64) -> f64 {
    new_height - previous_height + previous_top
}

/// One refresh of the viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub lines: Vec<RenderedLine>,
    pub counts: LevelCounts,
    pub chips: Vec<LevelChip>,
    pub displayed: usize,
    pub total_filtered: usize,
    pub showing_all: bool,
    pub is_following: bool,
    pub is_streaming: bool,
    /// Shown when nothing is displayed
    pub empty_hint: Option<&'static str>,
    /// Shown when older lines are hidden
    pub pagination_hint: Option<String>,
    #[serde(skip)]
    pub scroll: ScrollAction,
}

pub(crate) fn pagination_hint(displayed: usize, total: usize) -> String {
    format!(
        "Showing last {} of {} lines, scroll up to load more",
        group_thousands(displayed),
        group_thousands(total)
    )
}

fn group_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_counts() {
        assert_eq!(compact_count(0), "0");
        assert_eq!(compact_count(999), "999");
        assert_eq!(compact_count(1000), "1k");
        assert_eq!(compact_count(1999), "1k");
        assert_eq!(compact_count(25_300), "25k");
    }

    #[test]
    fn level_counts() {
        let mut counts = LevelCounts::default();
        counts.increment(LogLevel::Error);
        counts.increment(LogLevel::Error);
        counts.increment(LogLevel::Unknown);
        counts.decrement(LogLevel::Error);
        counts.decrement(LogLevel::Trace);
        assert_eq!(counts.get(LogLevel::Error), 1);
        assert_eq!(counts.get(LogLevel::Trace), 0);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn anchor_keeps_visual_position() {
        assert_eq!(anchor_scroll_top(1000.0, 20.0, 1800.0), 820.0);
        let action = ScrollAction::RestoreAnchor { previous_height: 1000.0, previous_top: 20.0 };
        assert_eq!(action.resolve(1800.0), Some(820.0));
        assert_eq!(ScrollAction::ScrollToBottom.resolve(500.0), Some(500.0));
        assert_eq!(ScrollAction::None.resolve(500.0), None);
    }

    #[test]
    fn distance_from_bottom() {
        let m = ScrollMetrics { scroll_top: 700.0, scroll_height: 1000.0, client_height: 280.0 };
        assert_eq!(m.distance_from_bottom(), 20.0);
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(pagination_hint(500, 1200), "Showing last 500 of 1,200 lines, scroll up to load more");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
        assert_eq!(group_thousands(12), "12");
    }
}
