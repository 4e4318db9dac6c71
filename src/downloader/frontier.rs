//! The crawl frontier: pending queue plus visited set.
//!
//! Deduplication happens at enqueue time: `enqueue_if_new` atomically
//! marks the canonical URL visited while inserting it, so a URL
//! discovered concurrently by two workers is queued exactly once.

use std::collections::VecDeque;
use std::sync::Mutex;

use dashmap::DashSet;

/// One pending URL with its crawl metadata.
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// URL exactly as discovered, kept for the index record.
    pub original_url: String,
    /// Canonical form; the deduplication key.
    pub canonical_url: String,
    /// Link distance from the start URL.
    pub depth: u8,
}

/// Shared work queue with built-in deduplication.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: Mutex<VecDeque<QueueItem>>,
    visited: DashSet<String>,
}

impl Frontier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue the item unless its canonical URL has been seen before.
    /// Returns whether the item was queued.
    pub fn enqueue_if_new(&self, item: QueueItem) -> bool {
        // DashSet::insert is the atomic check-and-mark; only the winner
        // of a concurrent race enqueues.
        if !self.visited.insert(item.canonical_url.clone()) {
            return false;
        }
        self.queue
            .lock()
            .expect("frontier queue lock poisoned")
            .push_back(item);
        true
    }

    pub fn pop(&self) -> Option<QueueItem> {
        self.queue
            .lock()
            .expect("frontier queue lock poisoned")
            .pop_front()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue
            .lock()
            .expect("frontier queue lock poisoned")
            .is_empty()
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
