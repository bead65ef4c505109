// src/models/run.rs

//! Process-scoped counters for a single scraping run.

use std::collections::HashSet;

use serde::Serialize;

/// Counters reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub pages_visited: usize,
    pub pages_skipped: usize,
    pub jobs_collected: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub details_fetched: usize,
}

/// Mutable run state owned by the pagination controller.
#[derive(Debug, Default)]
pub struct RunState {
    pub stats: RunStats,
    seen: HashSet<String>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_seen(&self, source_url: &str) -> bool {
        self.seen.contains(source_url)
    }

    /// Record a source URL. Returns false if it was already present.
    pub fn mark_seen(&mut self, source_url: impl Into<String>) -> bool {
        self.seen.insert(source_url.into())
    }

    #[cfg(test)]
    pub(crate) fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_seen_once() {
        let mut state = RunState::new();
        assert!(state.mark_seen("https://example.com/a"));
        assert!(!state.mark_seen("https://example.com/a"));
        assert!(state.is_seen("https://example.com/a"));
        assert_eq!(state.seen_count(), 1);
    }
}
