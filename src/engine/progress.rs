//! Progress bar utilities for displaying load status

use kdam::{Animation, Bar, BarExt};
use std::cell::Cell;
use std::sync::{Arc, Mutex};

use crate::utils::config::PROGRESS_UPDATE_BATCH_SIZE;

// Progress bar type alias
pub type ProgressBar = Arc<Mutex<Bar>>;

/// Create a progress bar with a known total.
pub fn create_progress_bar(total: usize, desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = total,
        desc = desc,
        animation = Animation::Classic,
        unit = " items"
    )))
}

/// Create a counter for unknown total (shows count without percentage)
pub fn create_counter(desc: &'static str) -> ProgressBar {
    Arc::new(Mutex::new(kdam::tqdm!(
        total = 0,
        desc = desc,
        animation = Animation::Classic,
        position = 0,
        unit = " items"
    )))
}

/// Bar for one loader run: percentage when the item count is known up front, counter otherwise.
pub fn bar_for(expected_items: Option<usize>, desc: &'static str) -> ProgressBar {
    match expected_items {
        Some(total) => create_progress_bar(total, desc),
        None => create_counter(desc),
    }
}

/// Update progress bar if available
/// Uses try_lock to avoid blocking if mutex is contended (non-blocking)
pub fn update_progress_bar(pb: &ProgressBar, n: usize) {
    if let Ok(mut pb) = pb.try_lock() {
        let _ = pb.update(n);
    }
}

/// Per-item callback for the aggregator: advances the bar every
/// [`PROGRESS_UPDATE_BATCH_SIZE`] items. Call [`ItemProgress::finish`] after the run for the remainder.
pub struct ItemProgress {
    bar: ProgressBar,
    pending: Cell<usize>,
}

impl ItemProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self {
            bar,
            pending: Cell::new(0),
        }
    }

    pub fn on_item(&self, _count: usize) {
        let pending = self.pending.get() + 1;
        if pending >= PROGRESS_UPDATE_BATCH_SIZE {
            update_progress_bar(&self.bar, pending);
            self.pending.set(0);
        } else {
            self.pending.set(pending);
        }
    }

    /// Flush the remainder and end the bar's line.
    pub fn finish(&self) {
        let pending = self.pending.replace(0);
        if let Ok(mut bar) = self.bar.lock() {
            if pending > 0 {
                let _ = bar.update(pending);
            }
            let _ = bar.refresh();
        }
        eprintln!();
    }
}
