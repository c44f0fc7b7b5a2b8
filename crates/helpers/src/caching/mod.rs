//! Keyed caches that back the memoization wrappers.
//!
//! All caches implement the [`MemoCache`] capability set, which is the only thing
//! [`Memoized`](crate::memo::Memoized) and [`AsyncMemoized`](crate::memo::AsyncMemoized) need.
//! Which one to pick depends on how arguments should be compared:
//!
//! - [`ArgsMap`]: per-argument identity or primitive equality, one trie level per argument.
//! - [`DequalMap`]: structural equality through [`PartialEq`], linear scan on lookup.
//! - [`StringifyMap`]: equality of the JSON encoding of the arguments.

mod arg_key;
mod args_map;
mod dequal_map;
mod stringify_map;

pub use arg_key::*;
pub use args_map::*;
pub use dequal_map::*;
pub use stringify_map::*;

/// The capability set a cache needs to back a memoized function.
///
/// `K` is the borrowed form of the key, so that [`ArgsMap`] can be probed with a plain
/// slice of arguments without allocating.
pub trait MemoCache<K: ?Sized, V> {
    /// Returns the value stored for `key`, if any.
    fn get(&self, key: &K) -> Option<&V>;

    /// Whether an entry for `key` exists.
    fn has(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Stores `value` for `key`, overwriting a previous entry.
    fn set(&mut self, key: &K, value: V);

    /// Removes the entry for `key`, returning whether there was one.
    fn delete(&mut self, key: &K) -> bool;

    /// Removes all entries.
    fn clear(&mut self);
}

/// A cache with exactly one slot, used for memoizing functions without arguments.
#[derive(Clone, Debug)]
pub struct SingleSlot<V> {
    value: Option<V>,
}

impl<V> SingleSlot<V> {
    pub fn new() -> Self {
        Self { value: None }
    }
}

impl<V> Default for SingleSlot<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoCache<(), V> for SingleSlot<V> {
    fn get(&self, _key: &()) -> Option<&V> {
        self.value.as_ref()
    }

    fn set(&mut self, _key: &(), value: V) {
        self.value = Some(value);
    }

    fn delete(&mut self, _key: &()) -> bool {
        self.value.take().is_some()
    }

    fn clear(&mut self) {
        self.value = None;
    }
}
