//! Run progress counters

use serde::Serialize;

/// Completed-versus-total counter for one mirror run
///
/// Owned by the single consumer of the run's message stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProgressState {
    completed: usize,
    total: usize,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Records one terminal outcome and returns the new completed count
    pub fn record(&mut self) -> usize {
        self.completed += 1;
        self.completed
    }

    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Completion percentage in `0.0..=100.0`; an empty run counts as done
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64 * 100.0).min(100.0)
    }
}
