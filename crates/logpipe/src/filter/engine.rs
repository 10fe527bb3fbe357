use std::ops::Range;

use grep_matcher::Matcher;
use grep_regex::{RegexMatcher, RegexMatcherBuilder};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),
}

/// Case-insensitive substring search, backed by the ripgrep matcher.
///
/// The query is matched literally: regex metacharacters typed into a search
/// box have no special meaning.
pub struct FilterEngine {
    query: String,
    matcher: RegexMatcher,
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

impl FilterEngine {
    pub fn new(query: &str) -> Result<Self, FilterError> {
        let matcher = RegexMatcherBuilder::new()
            .case_insensitive(true)
            .multi_line(false)
            .build(&regex::escape(query))
            .map_err(|e| FilterError::InvalidQuery(e.to_string()))?;

        Ok(Self {
            query: query.to_string(),
            matcher,
        })
    }

    /// Build an engine for a user-typed query. Blank queries mean
    /// "no filter" and yield `None`; so does a query the matcher rejects.
    pub fn from_query(query: Option<&str>) -> Option<Self> {
        let query = query.filter(|q| !q.is_empty())?;
        match Self::new(query) {
            Ok(engine) => Some(engine),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring search query");
                None
            }
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    #[inline]
    pub fn should_include(&self, line: &str) -> bool {
        self.matcher.is_match(line.as_bytes()).unwrap_or(false)
    }

    /// Byte ranges of every non-overlapping match in `text`.
    pub fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        if self.query.is_empty() {
            return ranges;
        }
        let scan = self.matcher.find_iter(text.as_bytes(), |m| {
            if m.start() < m.end() {
                ranges.push(m.start()..m.end());
            }
            true
        });
        match scan {
            Ok(()) => ranges,
            Err(e) => {
                tracing::debug!(error = %e, "Search range scan failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        let filter = FilterEngine::new("error").expect("Failed to create filter");

        assert!(filter.should_include("Error: something"));
        assert!(filter.should_include("error: something"));
        assert!(filter.should_include("ERROR: something"));
        assert!(!filter.should_include("all good"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let filter = FilterEngine::new("a.b(").expect("Failed to create filter");

        assert!(filter.should_include("value a.b( here"));
        assert!(!filter.should_include("value axb( here"));
    }

    #[test]
    fn test_blank_query_is_no_filter() {
        assert!(FilterEngine::from_query(None).is_none());
        assert!(FilterEngine::from_query(Some("")).is_none());
        assert!(FilterEngine::from_query(Some("x")).is_some());
    }

    #[test]
    fn test_find_ranges() {
        let filter = FilterEngine::new("ab").expect("Failed to create filter");
        assert_eq!(filter.find_ranges("xABy ab abab"), vec![1..3, 5..7, 8..10, 10..12]);
        assert!(filter.find_ranges("nothing").is_empty());
    }

    #[test]
    fn test_repeated_scans_agree() {
        let filter = FilterEngine::new("timeout").expect("Failed to create filter");
        let lines = ["db timeout", "ok", "TIMEOUT again"];

        let first: Vec<bool> = lines.iter().map(|l| filter.should_include(l)).collect();
        let second: Vec<bool> = lines.iter().map(|l| filter.should_include(l)).collect();
        assert_eq!(first, vec![true, false, true]);
        assert_eq!(first, second);
        assert_eq!(filter.find_ranges("db timeout"), filter.find_ranges("db timeout"));
    }

    #[test]
    fn test_find_ranges_multibyte() {
        let filter = FilterEngine::new("é").expect("Failed to create filter");
        let text = "café CAFÉ";
        let ranges = filter.find_ranges(text);
        assert_eq!(ranges.len(), 2);
        for r in ranges {
            assert!(text.is_char_boundary(r.start) && text.is_char_boundary(r.end));
        }
    }
}
