//! Recent-click ledger backing the debounce guard.

use crate::config::EngineConfig;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Bounded ledger of `(timestamp, selector)` click attempts, owned by the
/// action executor. Entries older than the window are evicted lazily on
/// each check; there is no background maintenance.
#[derive(Debug)]
pub struct ClickHistory {
    entries: VecDeque<(Instant, String)>,
    capacity: usize,
    window: Duration,
    threshold: usize,
}

impl ClickHistory {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.history_capacity),
            capacity: config.history_capacity,
            window: config.debounce_window(),
            threshold: config.debounce_threshold,
        }
    }

    /// Whether a click on `selector` should be suppressed as a repeat.
    ///
    /// When the window already holds `threshold` identical attempts the
    /// click is skipped and NOT recorded; otherwise the attempt is recorded
    /// and allowed. With the default threshold of 2 the third identical
    /// click inside the window is the first skipped one.
    pub fn should_skip(&mut self, selector: &str) -> bool {
        let now = Instant::now();
        while let Some((ts, _)) = self.entries.front() {
            if now.duration_since(*ts) > self.window {
                self.entries.pop_front();
            } else {
                break;
            }
        }

        let recent_same = self
            .entries
            .iter()
            .filter(|(_, s)| s == selector)
            .count();
        if recent_same >= self.threshold {
            return true;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((now, selector.to_string()));
        false
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(window_ms: u64, capacity: usize) -> ClickHistory {
        ClickHistory::new(&EngineConfig {
            debounce_window_ms: window_ms,
            history_capacity: capacity,
            ..EngineConfig::default()
        })
    }

    #[test]
    fn third_identical_attempt_in_window_is_skipped() {
        let mut h = history(2000, 100);
        assert!(!h.should_skip("role=button[name=/Save/i]"));
        assert!(!h.should_skip("role=button[name=/Save/i]"));
        assert!(h.should_skip("role=button[name=/Save/i]"));
        // A different selector is unaffected.
        assert!(!h.should_skip("role=button[name=/Cancel/i]"));
    }

    #[test]
    fn entries_outside_the_window_are_evicted() {
        let mut h = history(30, 100);
        assert!(!h.should_skip("x"));
        assert!(!h.should_skip("x"));
        std::thread::sleep(std::time::Duration::from_millis(40));
        assert!(!h.should_skip("x"));
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn ledger_is_bounded() {
        let mut h = history(60_000, 5);
        for i in 0..20 {
            assert!(!h.should_skip(&format!("selector-{i}")));
        }
        assert_eq!(h.len(), 5);
    }
}
