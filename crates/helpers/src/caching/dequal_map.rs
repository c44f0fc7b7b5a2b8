use std::fmt;

use super::MemoCache;

/// A map that compares keys by deep (structural) equality.
///
/// Keys only need to implement [`PartialEq`]. A lookup first checks whether the probe *is* one of
/// the stored keys, and otherwise scans all stored keys in insertion order and uses the first one
/// that compares equal.
///
/// Lookups are therefore `O(n)` in the number of distinct keys. This is intended: it allows keys
/// that cannot be hashed or serialized consistently, at the cost of performance degrading with the
/// number of entries. Prefer [`StringifyMap`](super::StringifyMap) when keys have a stable
/// serialization and there are many of them.
#[derive(Clone)]
pub struct DequalMap<K, V> {
    entries: Vec<(K, V)>,
}

impl<K, V> DequalMap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(key, _)| key)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, value)| value)
    }
}

impl<K: PartialEq, V> DequalMap<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.entries
            .iter()
            .position(|(stored, _)| std::ptr::eq(stored, key) || stored == key)
    }

    /// Returns the stored key that is equal to `key`.
    pub fn find_key(&self, key: &K) -> Option<&K> {
        self.position(key).map(|index| &self.entries[index].0)
    }

    /// Stores `value` for `key`, returning the previous value.
    ///
    /// If an equal key is already stored, its value is overwritten in place and the originally
    /// stored key is kept.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Identical to [`set`](Self::set), but returns a reference to the stored value.
    pub fn set_return_value(&mut self, key: K, value: V) -> &V {
        let index = match self.position(&key) {
            Some(index) => {
                self.entries[index].1 = value;
                index
            }
            None => {
                self.entries.push((key, value));
                self.entries.len() - 1
            }
        };
        &self.entries[index].1
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.position(key).map(|index| &mut self.entries[index].1)
    }

    pub fn has(&self, key: &K) -> bool {
        self.position(key).is_some()
    }

    /// Removes the entry equal to `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let index = self.position(key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn delete(&mut self, key: &K) -> bool {
        self.remove(key).is_some()
    }
}

impl<K, V> Default for DequalMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for DequalMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V> Extend<(K, V)> for DequalMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<K: PartialEq, V> FromIterator<(K, V)> for DequalMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: PartialEq + Clone, V> MemoCache<K, V> for DequalMap<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        DequalMap::get(self, key)
    }

    fn has(&self, key: &K) -> bool {
        DequalMap::has(self, key)
    }

    fn set(&mut self, key: &K, value: V) {
        match self.get_mut(key) {
            Some(slot) => *slot = value,
            None => self.entries.push((key.clone(), value)),
        }
    }

    fn delete(&mut self, key: &K) -> bool {
        DequalMap::delete(self, key)
    }

    fn clear(&mut self) {
        DequalMap::clear(self)
    }
}
