//! Per-file debouncing of content events.
//!
//! Editors often touch a file several times per save (truncate, write,
//! chmod, rename). The controller records each content event here and only
//! treats a file as changed once it has been quiet for the configured window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Debounces content events by path.
#[derive(Debug)]
pub struct Debouncer {
    /// Pending changes: path -> last event timestamp.
    pending: HashMap<PathBuf, Instant>,
    /// How long a file must be quiet before it is reported.
    window: Duration,
}

impl Debouncer {
    /// Create a new debouncer with the given window in milliseconds.
    ///
    /// A zero window reports every recorded path on the next `take_ready`.
    pub fn new(window_ms: u64) -> Self {
        Self {
            pending: HashMap::new(),
            window: Duration::from_millis(window_ms),
        }
    }

    /// Record a content event, restarting the window for this path.
    pub fn record(&mut self, path: PathBuf) {
        self.pending.insert(path, Instant::now());
    }

    /// Drop every pending path for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&Path) -> bool) {
        self.pending.retain(|path, _| keep(path));
    }

    /// Take all paths that have been quiet for the whole window.
    pub fn take_ready(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|path, last_event| {
            if now.duration_since(*last_event) >= self.window {
                ready.push(path.clone());
                false
            } else {
                true
            }
        });

        ready.sort();
        ready
    }

    /// Time until the earliest pending path becomes ready.
    ///
    /// `None` when nothing is pending.
    pub fn next_ready_in(&self) -> Option<Duration> {
        let now = Instant::now();
        self.pending
            .values()
            .map(|last_event| (*last_event + self.window).saturating_duration_since(now))
            .min()
    }
}
