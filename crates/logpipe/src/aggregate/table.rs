//! The bounded table of retained problem lines.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::model::{AggregatedEntry, RetainedLine, SourceDescriptor};
use crate::filter::FilterEngine;
use crate::parser::{strip_ansi_codes, LogLevel, ParsedLine};

pub const DEFAULT_MAX_ENTRIES: usize = 2000;

/// Retained lines in arrival order, oldest evicted first.
///
/// Once closed, the table rejects every insert.
#[derive(Debug)]
pub struct EntryTable {
    lines: VecDeque<RetainedLine>,
    capacity: usize,
    next_seq: u64,
    closed: bool,
}

impl Default for EntryTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl EntryTable {
    pub fn new(capacity: usize) -> Self {
        Self { lines: VecDeque::new(), capacity: capacity.max(1), next_seq: 0, closed: false }
    }

    /// Retain a classified line. `received_at` stands in for lines without
    /// a resolvable instant. Returns `(retained, evicted)`.
    pub fn insert(
        &mut self,
        source: &SourceDescriptor,
        line: ParsedLine,
        received_at: DateTime<Utc>,
    ) -> (bool, usize) {
        if self.closed {
            return (false, 0);
        }
        let epoch_ms = line.instant().unwrap_or(received_at).timestamp_millis();
        self.lines.push_back(RetainedLine {
            seq: self.next_seq,
            source_id: source.source_id.clone(),
            workload_name: source.workload_name.clone(),
            line,
            epoch_ms,
        });
        self.next_seq += 1;

        let mut evicted = 0;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
            evicted += 1;
        }
        (true, evicted)
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &RetainedLine> {
        self.lines.iter()
    }

    /// Deduplicated view, most recent group first.
    ///
    /// Lines are filtered by `filter` (source id or message) before
    /// grouping. Groups key on level plus the trimmed, escape-stripped
    /// message; a group's representative is its line with the latest
    /// instant, the first such line on ties.
    pub fn snapshot(&self, filter: Option<&FilterEngine>) -> Vec<AggregatedEntry> {
        let mut index: HashMap<(LogLevel, String), usize> = HashMap::new();
        let mut groups: Vec<AggregatedEntry> = Vec::new();

        let matching = self.lines.iter().filter(|l| {
            filter.map_or(true, |f| f.should_include(&l.source_id) || f.should_include(&l.line.message))
        });

        for retained in matching {
            let key = (retained.line.level, strip_ansi_codes(&retained.line.message).trim().to_string());
            match index.get(&key) {
                Some(&i) => {
                    let group = &mut groups[i];
                    group.count += 1;
                    group.sources.insert(retained.source_id.clone());
                    if retained.epoch_ms > group.epoch_ms {
                        group.line = retained.line.clone();
                        group.source_id = retained.source_id.clone();
                        group.workload_name = retained.workload_name.clone();
                        group.epoch_ms = retained.epoch_ms;
                        group.seq = retained.seq;
                    }
                }
                None => {
                    index.insert(key, groups.len());
                    groups.push(AggregatedEntry {
                        line: retained.line.clone(),
                        source_id: retained.source_id.clone(),
                        workload_name: retained.workload_name.clone(),
                        epoch_ms: retained.epoch_ms,
                        count: 1,
                        sources: BTreeSet::from([retained.source_id.clone()]),
                        seq: retained.seq,
                    });
                }
            }
        }

        groups.sort_by(|a, b| b.epoch_ms.cmp(&a.epoch_ms).then(b.seq.cmp(&a.seq)));
        groups
    }
}
