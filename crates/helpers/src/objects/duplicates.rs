use std::collections::HashSet;
use std::hash::Hash;

/// Remembers keys to tell whether one has been seen before.
#[derive(Clone, Debug)]
pub struct DuplicateTracker<K> {
    seen: HashSet<K>,
}

impl<K: Hash + Eq> DuplicateTracker<K> {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Returns `false` the first time `key` is passed, and `true` on every later call.
    pub fn is_duplicate(&mut self, key: K) -> bool {
        !self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forgets all seen keys.
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

impl<K: Hash + Eq> Default for DuplicateTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
