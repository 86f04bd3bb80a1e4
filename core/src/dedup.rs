/// Bounded set of processed message identities
///
/// Insertion order is observation order, so overflow eviction drops the
/// oldest entries first. Evicted messages can re-surface as "new" if the
/// server replays them much later; that trade-off keeps memory bounded for
/// long-running sessions.
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct DedupStore {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record an identity. No-op when already present.
    pub fn add(&mut self, id: String) {
        if self.seen.insert(id.clone()) {
            self.order.push_back(id);
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.seen.clear();
    }

    /// Drop the oldest entries beyond `cap`.
    pub fn evict_overflow(&mut self, cap: usize) {
        while self.order.len() > cap {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
