use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use super::highlight::highlight_markup;
use super::model::{
    compact_count, pagination_hint, LevelChip, LevelCounts, Projection, RenderedLine, ScrollAction,
    ScrollMetrics, ViewerOptions, EMPTY_HINT, WAITING_HINT,
};
use crate::filter::FilterEngine;
use crate::parser::{classify, render_ansi, strip_ansi_codes, ClassifierConfig, LogLevel, ParsedLine};
use crate::session::{LogTail, SessionId, SessionRegistry};

/// Windowed, filterable view over one log session.
///
/// The viewer never mutates lines; it reads deltas from the registry and
/// classifies each line once. Classification results for evicted lines
/// are dropped along with their level counts.
#[derive(Debug)]
pub struct WindowedViewer {
    session_id: SessionId,
    classifier: Arc<ClassifierConfig>,
    options: ViewerOptions,
    visible_count: usize,
    active_levels: [bool; 6],

    /// Classified lines covering sequence numbers `[cache_first_seq, cache_next_seq)`
    cache: VecDeque<ParsedLine>,
    cache_first_seq: u64,
    cache_next_seq: u64,
    counts: LevelCounts,

    user_scrolled_away: bool,
    was_following: bool,
    total_filtered: usize,
    pending_scroll: ScrollAction,
}

impl WindowedViewer {
    pub fn new(session_id: SessionId, classifier: Arc<ClassifierConfig>, options: ViewerOptions) -> Self {
        Self {
            session_id,
            classifier,
            visible_count: options.page_size,
            options,
            active_levels: [true; 6],
            cache: VecDeque::new(),
            cache_first_seq: 0,
            cache_next_seq: 0,
            counts: LevelCounts::default(),
            user_scrolled_away: false,
            was_following: true,
            total_filtered: 0,
            pending_scroll: ScrollAction::None,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn visible_count(&self) -> usize {
        self.visible_count
    }

    pub fn counts(&self) -> LevelCounts {
        self.counts
    }

    /// Swap the classifier configuration; every retained line is
    /// reclassified on the next refresh.
    pub fn set_classifier(&mut self, classifier: Arc<ClassifierConfig>) {
        self.classifier = classifier;
        self.cache.clear();
        self.cache_first_seq = 0;
        self.cache_next_seq = 0;
        self.counts = LevelCounts::default();
    }

    // ── Level filter ────────────────────────────────────────────

    pub fn toggle_level(&mut self, level: LogLevel) -> bool {
        let slot = &mut self.active_levels[level.index()];
        *slot = !*slot;
        *slot
    }

    pub fn set_level_active(&mut self, level: LogLevel, active: bool) {
        self.active_levels[level.index()] = active;
    }

    pub fn is_level_active(&self, level: LogLevel) -> bool {
        self.active_levels[level.index()]
    }

    pub fn active_levels(&self) -> Vec<LogLevel> {
        LogLevel::ALL.into_iter().filter(|l| self.is_level_active(*l)).collect()
    }

    // ── Refresh ─────────────────────────────────────────────────

    /// Pull new lines from the registry into the classification cache.
    /// Returns `(appended, evicted)`, or `None` if the session is gone.
    pub fn sync(&mut self, registry: &SessionRegistry) -> Option<(usize, usize)> {
        let delta = registry.lines_since(&self.session_id, self.cache_next_seq)?;

        let mut evicted = 0;
        while self.cache_first_seq < delta.first_seq {
            match self.cache.pop_front() {
                Some(old) => {
                    self.counts.decrement(old.level);
                    self.cache_first_seq += 1;
                    evicted += 1;
                }
                None => {
                    self.cache_first_seq = delta.first_seq;
                    break;
                }
            }
        }

        let appended = delta.lines.len();
        for raw in delta.lines {
            let parsed = classify(raw, &self.classifier);
            self.counts.increment(parsed.level);
            self.cache.push_back(parsed);
        }
        self.cache_next_seq = delta.next_seq;

        if appended > 0 || evicted > 0 {
            debug!(session = %self.session_id, appended, evicted, "Viewer cache synced");
        }
        Some((appended, evicted))
    }

    /// Sync and compute what to display. `None` once the session is closed.
    pub fn project(&mut self, registry: &SessionRegistry) -> Option<Projection> {
        let (appended, evicted) = self.sync(registry)?;
        let log = registry.session(&self.session_id)?.log?;

        if log.is_following && !self.was_following {
            self.visible_count = self.options.page_size;
        }
        self.was_following = log.is_following;

        let filter = FilterEngine::from_query(Some(log.search_query.as_str()));
        let filtered: Vec<(u64, &ParsedLine)> = self
            .cache
            .iter()
            .enumerate()
            .map(|(i, parsed)| (self.cache_first_seq + i as u64, parsed))
            .filter(|(_, parsed)| self.active_levels[parsed.level.index()])
            .filter(|(_, parsed)| {
                filter.as_ref().map_or(true, |f| f.should_include(&strip_ansi_codes(&parsed.raw)))
            })
            .collect();

        let total_filtered = filtered.len();
        let showing_all = self.visible_count >= total_filtered;
        let skip = total_filtered.saturating_sub(self.visible_count);

        let lines: Vec<RenderedLine> = filtered[skip..]
            .iter()
            .map(|(seq, parsed)| {
                let html = render_ansi(&parsed.raw);
                let html = match &filter {
                    Some(f) => highlight_markup(&html, f),
                    None => html,
                };
                RenderedLine { seq: *seq, level: parsed.level, html }
            })
            .collect();
        let displayed = lines.len();
        self.total_filtered = total_filtered;

        let mut scroll = std::mem::take(&mut self.pending_scroll);
        if scroll == ScrollAction::None
            && log.is_following
            && !self.user_scrolled_away
            && (appended > 0 || evicted > 0)
        {
            scroll = ScrollAction::ScrollToBottom;
        }

        let empty_hint = (displayed == 0).then_some(if log.is_streaming { WAITING_HINT } else { EMPTY_HINT });
        let pagination_hint = (!showing_all).then(|| pagination_hint(displayed, total_filtered));

        Some(Projection {
            lines,
            counts: self.counts,
            chips: self.chips(),
            displayed,
            total_filtered,
            showing_all,
            is_following: log.is_following,
            is_streaming: log.is_streaming,
            empty_hint,
            pagination_hint,
            scroll,
        })
    }

    fn chips(&self) -> Vec<LevelChip> {
        LogLevel::ALL
            .into_iter()
            .map(|level| {
                let count = self.counts.get(level);
                LevelChip {
                    level,
                    label: level.label(),
                    count,
                    display_count: (count > 0).then(|| compact_count(count)),
                    active: self.is_level_active(level),
                }
            })
            .collect()
    }

    // ── Interaction ─────────────────────────────────────────────

    /// React to a scroll event. Leaving the bottom disables follow; nearing
    /// the top grows the window by a page, anchored in place.
    pub fn on_scroll(&mut self, registry: &SessionRegistry, metrics: ScrollMetrics) -> ScrollAction {
        let at_bottom = metrics.distance_from_bottom() < self.options.follow_tolerance_px;
        self.user_scrolled_away = !at_bottom;

        if !at_bottom {
            let following = registry
                .session(&self.session_id)
                .and_then(|s| s.log)
                .map_or(false, |log| log.is_following);
            if following {
                registry.set_following(&self.session_id, false);
                self.was_following = false;
            }
        }

        let showing_all = self.visible_count >= self.total_filtered;
        if metrics.scroll_top < self.options.load_more_threshold_px && !showing_all {
            self.visible_count = (self.visible_count + self.options.page_size).min(self.total_filtered);
            let action = ScrollAction::RestoreAnchor {
                previous_height: metrics.scroll_height,
                previous_top: metrics.scroll_top,
            };
            self.pending_scroll = action;
            return action;
        }
        ScrollAction::None
    }

    /// Re-enable follow: reset the window and jump to the bottom.
    pub fn follow(&mut self, registry: &SessionRegistry) -> ScrollAction {
        registry.set_following(&self.session_id, true);
        self.visible_count = self.options.page_size;
        self.user_scrolled_away = false;
        self.was_following = true;
        self.pending_scroll = ScrollAction::ScrollToBottom;
        ScrollAction::ScrollToBottom
    }

    /// Empty the session's buffer and reset the window.
    pub fn clear(&mut self, registry: &SessionRegistry) {
        registry.clear(&self.session_id);
        self.visible_count = self.options.page_size;
    }

    /// Restart the session on another container and reset the window.
    pub async fn switch_container(&mut self, tail: &LogTail, container: Option<String>) -> bool {
        self.visible_count = self.options.page_size;
        tail.switch_container(&self.session_id, container).await
    }
}
