use serde::Deserialize;
use std::time::Duration;

/// Timeouts and thresholds for every bounded wait in the engine.
///
/// All waits are short and fixed; a wait that expires converts into a
/// result, never into an uncaught fault.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a locator polls for a visible match before giving up.
    pub visibility_wait_ms: u64,
    /// Wait for a menu/listbox overlay to appear after clicking an opener.
    pub popup_wait_ms: u64,
    /// Shorter wait used for the keyboard-gesture retry of the open phase.
    pub popup_retry_wait_ms: u64,
    /// Interval between overlay-close polls after a selection click.
    pub popup_close_poll_ms: u64,
    /// Number of overlay-close polls.
    pub popup_close_polls: u32,
    /// Polling interval for visibility waits.
    pub poll_interval_ms: u64,
    /// Sliding window within which repeated identical click selectors are suppressed.
    pub debounce_window_ms: u64,
    /// Identical attempts inside the window before the next one is skipped.
    pub debounce_threshold: usize,
    /// Upper bound on the recent-click ledger.
    pub history_capacity: usize,
    /// A fill value at least this long is treated as description-like text.
    pub long_text_threshold: usize,
    /// Upper bound on dialog chips scanned when checking a current value.
    pub max_chip_scan: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            visibility_wait_ms: 1500,
            popup_wait_ms: 1500,
            popup_retry_wait_ms: 800,
            popup_close_poll_ms: 50,
            popup_close_polls: 5,
            poll_interval_ms: 25,
            debounce_window_ms: 2000,
            debounce_threshold: 2,
            history_capacity: 100,
            long_text_threshold: 40,
            max_chip_scan: 20,
        }
    }
}

impl EngineConfig {
    pub fn visibility_wait(&self) -> Duration {
        Duration::from_millis(self.visibility_wait_ms)
    }

    pub fn popup_wait(&self) -> Duration {
        Duration::from_millis(self.popup_wait_ms)
    }

    pub fn popup_retry_wait(&self) -> Duration {
        Duration::from_millis(self.popup_retry_wait_ms)
    }

    pub fn popup_close_poll(&self) -> Duration {
        Duration::from_millis(self.popup_close_poll_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }
}
