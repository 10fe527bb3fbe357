use std::collections::VecDeque;
use std::sync::Arc;

/// Lines retained for a session, oldest first.
///
/// Every line ever appended gets a sequence number; eviction advances
/// `first_seq` so readers can fetch only what they have not seen.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    lines: VecDeque<Arc<str>>,
    capacity: usize,
    next_seq: u64,
}

/// Lines at or after a requested sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinesDelta {
    /// Sequence number of the oldest retained line
    pub first_seq: u64,
    /// Sequence number the next appended line will get
    pub next_seq: u64,
    /// Retained lines from `max(requested, first_seq)` on
    pub lines: Vec<Arc<str>>,
}

impl LineBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { lines: VecDeque::new(), capacity: capacity.max(1), next_seq: 0 }
    }

    /// Append a batch in order and evict the oldest lines beyond capacity.
    /// Returns how many lines were evicted.
    pub fn extend<I>(&mut self, batch: I) -> usize
    where
        I: IntoIterator,
        I::Item: Into<Arc<str>>,
    {
        let mut evicted = 0;
        for line in batch {
            self.lines.push_back(line.into());
            self.next_seq += 1;
            if self.lines.len() > self.capacity {
                self.lines.pop_front();
                evicted += 1;
            }
        }
        evicted
    }

    /// Drop every line. Sequence numbers keep counting.
    pub fn clear(&mut self) {
        self.lines.clear();
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

    pub fn first_seq(&self) -> u64 {
        self.next_seq - self.lines.len() as u64
    }

    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<str>> {
        self.lines.iter()
    }

    pub fn since(&self, seq: u64) -> LinesDelta {
        let first_seq = self.first_seq();
        let skip = seq.saturating_sub(first_seq).min(self.lines.len() as u64) as usize;
        LinesDelta {
            first_seq,
            next_seq: self.next_seq,
            lines: self.lines.iter().skip(skip).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(buf: &LineBuffer) -> Vec<String> {
        buf.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn keeps_most_recent_lines() {
        let mut buf = LineBuffer::new(3);
        assert_eq!(buf.extend(["a", "b"]), 0);
        assert_eq!(buf.extend(["c", "d", "e"]), 2);
        assert_eq!(texts(&buf), vec!["c", "d", "e"]);
        assert_eq!((buf.first_seq(), buf.next_seq()), (2, 5));
    }

    #[test]
    fn oversized_batch_keeps_its_tail() {
        let mut buf = LineBuffer::new(2);
        buf.extend(["1", "2", "3", "4", "5"]);
        assert_eq!(texts(&buf), vec!["4", "5"]);
    }

    #[test]
    fn since_returns_only_unseen_lines() {
        let mut buf = LineBuffer::new(10);
        buf.extend(["a", "b", "c"]);
        let delta = buf.since(1);
        assert_eq!(delta.lines.len(), 2);
        assert_eq!(&*delta.lines[0], "b");
        assert!(buf.since(3).lines.is_empty());
        assert!(buf.since(99).lines.is_empty());
    }

    #[test]
    fn since_before_first_seq_starts_at_oldest() {
        let mut buf = LineBuffer::new(2);
        buf.extend(["a", "b", "c", "d"]);
        let delta = buf.since(0);
        assert_eq!(delta.first_seq, 2);
        assert_eq!(delta.lines.iter().map(|l| l.to_string()).collect::<Vec<_>>(), vec!["c", "d"]);
    }

    #[test]
    fn clear_keeps_sequence() {
        let mut buf = LineBuffer::new(10);
        buf.extend(["a", "b"]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!((buf.first_seq(), buf.next_seq()), (2, 2));
        buf.extend(["c"]);
        assert_eq!(buf.since(0).lines.len(), 1);
    }
}
