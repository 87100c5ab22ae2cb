use std::collections::VecDeque;

use itertools::Itertools;
use parking_lot::Mutex;

use crate::{
    similarity::{token_overlap, DUPLICATE_THRESHOLD},
    PostHistory,
};

/// Bounded, insertion-ordered history of recently emitted texts.
///
/// Oldest entries are evicted first once `capacity` is reached. All
/// operations take the same lock, so [`PostHistory::record_if_unique`]
/// is atomic with respect to concurrent emitters.
#[derive(Debug)]
pub struct DedupCache {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl DedupCache {
    pub const DEFAULT_CAPACITY: usize = 50;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        DedupCache {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of the cached texts, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect_vec()
    }

    fn matches_any(entries: &VecDeque<String>, text: &str) -> bool {
        let text = text.trim();
        entries.iter().any(|cached| {
            if cached == text {
                return true;
            }
            let overlap = token_overlap(cached, text);
            if overlap > DUPLICATE_THRESHOLD {
                tracing::debug!(overlap, cached = %cached, "Near-duplicate announcement");
                return true;
            }
            false
        })
    }

    fn push(&self, entries: &mut VecDeque<String>, text: &str) {
        entries.push_back(text.trim().to_string());
        while entries.len() > self.capacity {
            if let Some(evicted) = entries.pop_front() {
                tracing::trace!(evicted = %evicted, "Evicted oldest announcement from history");
            }
        }
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        DedupCache::new(Self::DEFAULT_CAPACITY)
    }
}

impl PostHistory for DedupCache {
    fn is_duplicate(&self, text: &str) -> bool {
        Self::matches_any(&self.entries.lock(), text)
    }

    fn record(&self, text: &str) {
        let mut entries = self.entries.lock();
        self.push(&mut entries, text);
    }

    fn record_if_unique(&self, text: &str) -> bool {
        let mut entries = self.entries.lock();
        if Self::matches_any(&entries, text) {
            return false;
        }
        self.push(&mut entries, text);
        true
    }
}
