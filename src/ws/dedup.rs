//! Bounded trade-id deduplication
//!
//! The user feed may redeliver a trade notification. Ids are remembered in
//! insertion order and the oldest is evicted once capacity is reached, so
//! memory stays flat over long sessions.

use std::collections::{HashSet, VecDeque};

/// FIFO-evicting set of seen trade ids
#[derive(Debug)]
pub struct TradeDedup {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl TradeDedup {
    /// Create a set remembering at most `capacity` ids (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record `id`; returns `true` the first time it is seen
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }
}
