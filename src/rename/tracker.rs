//! Consistency window of recent renames.

use std::collections::VecDeque;

use crate::ai::RenameExample;

/// Fixed-capacity FIFO of the most recent successful renames.
///
/// Only lives for one batch run; every run starts empty.
#[derive(Debug, Clone)]
pub struct ConsistencyTracker {
    capacity: usize,
    window: VecDeque<RenameExample>,
}

impl ConsistencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            window: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Append a rename, evicting the oldest entries past capacity
    pub fn record(&mut self, original_name: &str, new_name: &str) {
        if self.capacity == 0 {
            return;
        }

        self.window
            .push_back(RenameExample::new(original_name, new_name));
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
    }

    /// Current window, oldest first
    pub fn snapshot(&self) -> Vec<RenameExample> {
        self.window.iter().cloned().collect()
    }
}
