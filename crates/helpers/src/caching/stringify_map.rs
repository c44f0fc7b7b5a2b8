use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use thiserror::Error;

use super::MemoCache;

/// A cache key could not be serialized.
#[derive(Debug, Error)]
#[error("failed to encode cache key")]
pub struct KeyEncodingError(#[from] serde_json::Error);

/// A map keyed by the JSON encoding of its keys.
///
/// This allows arbitrary serializable values as keys, with equality defined by their encoding.
/// Note that the encoding is order sensitive: two maps with the same entries in a different
/// order encode differently, unless their serialization is ordered (like a `BTreeMap`).
///
/// Keys that fail to serialize can never be stored; [`set`](Self::set) reports the error, and
/// lookups treat them as absent.
pub struct StringifyMap<K: ?Sized, V> {
    entries: HashMap<String, V>,
    _key: PhantomData<fn(&K)>,
}

impl<K: ?Sized, V> StringifyMap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            _key: PhantomData,
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

    /// Iterates over the encoded keys and their values, in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K: Serialize + ?Sized, V> StringifyMap<K, V> {
    /// Encodes `key` the way it is stored in this map.
    pub fn encode(key: &K) -> Result<String, KeyEncodingError> {
        Ok(serde_json::to_string(key)?)
    }

    fn lookup_key(key: &K) -> Option<String> {
        match Self::encode(key) {
            Ok(encoded) => Some(encoded),
            Err(error) => {
                tracing::trace!(error = &error as &dyn std::error::Error, "Unencodable key lookup");
                None
            }
        }
    }

    /// Stores `value` for `key`, returning the previous value.
    pub fn set(&mut self, key: &K, value: V) -> Result<Option<V>, KeyEncodingError> {
        let encoded = Self::encode(key)?;
        Ok(self.entries.insert(encoded, value))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(&Self::lookup_key(key)?)
    }

    pub fn has(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(&Self::lookup_key(key)?)
    }

    pub fn delete(&mut self, key: &K) -> bool {
        self.remove(key).is_some()
    }
}

impl<K: ?Sized, V> Default for StringifyMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ?Sized, V: fmt::Debug> fmt::Debug for StringifyMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Serialize + ?Sized, V> MemoCache<K, V> for StringifyMap<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        StringifyMap::get(self, key)
    }

    fn has(&self, key: &K) -> bool {
        StringifyMap::has(self, key)
    }

    fn set(&mut self, key: &K, value: V) {
        // the value is still handed to the caller, it just won't be remembered
        if let Err(error) = StringifyMap::set(self, key, value) {
            tracing::warn!(
                error = &error as &dyn std::error::Error,
                "Not caching value for unencodable key"
            );
        }
    }

    fn delete(&mut self, key: &K) -> bool {
        StringifyMap::delete(self, key)
    }

    fn clear(&mut self) {
        StringifyMap::clear(self)
    }
}
