//! Incremental reveal of a long listing.
//!
//! Only a prefix of the listing is shown. Each time the sentinel at the end
//! of the shown prefix becomes visible the prefix grows by one batch.

use tracing::debug;

/// Number of images shown right after a listing arrives.
pub const DEFAULT_INITIAL_BATCH: usize = 20;
/// Number of images added per sentinel trigger.
pub const DEFAULT_BATCH_SIZE: usize = 20;

#[derive(Debug, Clone)]
pub struct RevealController {
    initial: usize,
    batch_size: usize,
    total: usize,
    count: usize,
    sentinel_visible: bool,
}

impl RevealController {
    pub fn new(initial: usize, batch_size: usize) -> Self {
        Self {
            initial,
            batch_size,
            total: 0,
            count: 0,
            sentinel_visible: false,
        }
    }

    /// Number of images currently shown.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.count >= self.total
    }

    /// Resets the window for a new listing of `total` images.
    pub fn reset(&mut self, total: usize) {
        self.total = total;
        self.count = self.initial.min(total);
        self.sentinel_visible = false;
        debug!(count = self.count, total, "Reveal window reset");
    }

    /// Feeds the sentinel visibility signal.
    ///
    /// Grows the window on a hidden-to-visible transition only. Returns the
    /// range of newly shown indices, if any.
    pub fn sentinel_changed(&mut self, visible: bool) -> Option<std::ops::Range<usize>> {
        let rising = visible && !self.sentinel_visible;
        self.sentinel_visible = visible;
        if !rising || self.is_complete() {
            return None;
        }

        let start = self.count;
        self.count = (self.count + self.batch_size).min(self.total);
        debug!(count = self.count, total = self.total, "Revealed more images");
        Some(start..self.count)
    }
}

impl Default for RevealController {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_BATCH, DEFAULT_BATCH_SIZE)
    }
}
