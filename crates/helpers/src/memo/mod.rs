//! Memoization of functions on top of the caches in [`caching`](crate::caching).
//!
//! [`Memoized`] wraps a synchronous generator, [`AsyncMemoized`] one that returns a future. Both
//! work with any [`MemoCache`], the constructors in this module pick the cache:
//!
//! | constructor           | async                       | cache            |
//! |-----------------------|-----------------------------|------------------|
//! | [`memoize`]           | [`memoize_async`]           | [`ArgsMap`]      |
//! | [`memoize_dequal`]    | [`memoize_async_dequal`]    | [`DequalMap`]    |
//! | [`memoize_stringify`] | [`memoize_async_stringify`] | [`StringifyMap`] |
//! | [`memoize_argless`]   | [`memoize_async_argless`]   | [`SingleSlot`]   |
//! | [`with_cache`]        | [`with_async_cache`]        | any              |

use std::marker::PhantomData;
use std::time::Instant;

use parking_lot::Mutex;

use crate::caching::{ArgsMap, DequalMap, MemoCache, SingleSlot, StringifyMap};

mod future;

pub use future::*;

/// A memoized synchronous function.
///
/// On a cache hit, the stored value is cloned and returned without invoking the generator. On a
/// miss, the generator runs and its result is stored for `key`.
///
/// The cache lock is not held while the generator runs, so the generator may itself call into the
/// memoized function, for example for recursive definitions.
pub struct Memoized<K: ?Sized, V, C, F> {
    generator: F,
    cache: Mutex<C>,
    _key: PhantomData<fn(&K) -> V>,
}

impl<K, V, C, F> Memoized<K, V, C, F>
where
    K: ?Sized,
    V: Clone,
    C: MemoCache<K, V>,
    F: Fn(&K) -> V,
{
    /// Memoizes `generator` using a custom `cache`.
    pub fn new(generator: F, cache: C) -> Self {
        Self {
            generator,
            cache: Mutex::new(cache),
            _key: PhantomData,
        }
    }

    pub fn call(&self, key: &K) -> V {
        if let Some(value) = self.cache.lock().get(key) {
            metric!(counter("memoize.hit") += 1);
            tracing::trace!("Memoized value hit");
            return value.clone();
        }

        metric!(counter("memoize.miss") += 1);
        tracing::trace!("Memoized value miss");
        let started = Instant::now();
        let value = (self.generator)(key);
        metric!(timer("memoize.generate") = started.elapsed());
        self.cache.lock().set(key, value.clone());
        value
    }

    /// Whether a value for `key` is currently cached.
    pub fn has(&self, key: &K) -> bool {
        self.cache.lock().has(key)
    }

    /// Invalidates the cached value for `key` only.
    pub fn clear_key(&self, key: &K) -> bool {
        self.cache.lock().delete(key)
    }

    /// Invalidates all cached values.
    pub fn clear(&self) {
        self.cache.lock().clear()
    }
}

/// A memoized fallible function.
///
/// Like [`Memoized`], but errors are passed through to the caller without being cached, so the
/// next call for the same key runs the generator again.
pub struct TryMemoized<K: ?Sized, V, E, C, F> {
    generator: F,
    cache: Mutex<C>,
    _key: PhantomData<fn(&K) -> Result<V, E>>,
}

impl<K, V, E, C, F> TryMemoized<K, V, E, C, F>
where
    K: ?Sized,
    V: Clone,
    C: MemoCache<K, V>,
    F: Fn(&K) -> Result<V, E>,
{
    pub fn new(generator: F, cache: C) -> Self {
        Self {
            generator,
            cache: Mutex::new(cache),
            _key: PhantomData,
        }
    }

    pub fn call(&self, key: &K) -> Result<V, E> {
        if let Some(value) = self.cache.lock().get(key) {
            metric!(counter("memoize.hit") += 1);
            return Ok(value.clone());
        }

        metric!(counter("memoize.miss") += 1);
        let started = Instant::now();
        let result = (self.generator)(key);
        metric!(timer("memoize.generate") = started.elapsed());
        let value = result?;
        self.cache.lock().set(key, value.clone());
        Ok(value)
    }

    pub fn has(&self, key: &K) -> bool {
        self.cache.lock().has(key)
    }

    pub fn clear_key(&self, key: &K) -> bool {
        self.cache.lock().delete(key)
    }

    pub fn clear(&self) {
        self.cache.lock().clear()
    }
}

/// A memoized function without arguments.
///
/// All calls are equivalent, so a single slot is used instead of a keyed cache.
pub struct MemoizedArgless<V, F> {
    generator: F,
    slot: Mutex<SingleSlot<V>>,
}

impl<V, F> MemoizedArgless<V, F>
where
    V: Clone,
    F: Fn() -> V,
{
    pub fn new(generator: F) -> Self {
        Self {
            generator,
            slot: Mutex::new(SingleSlot::new()),
        }
    }

    pub fn call(&self) -> V {
        if let Some(value) = self.slot.lock().get(&()) {
            return value.clone();
        }

        let value = (self.generator)();
        self.slot.lock().set(&(), value.clone());
        value
    }

    pub fn has(&self) -> bool {
        self.slot.lock().has(&())
    }

    pub fn clear(&self) {
        self.slot.lock().clear()
    }
}

/// Memoizes `generator` keyed by its argument list, compared element by element.
pub fn memoize<P, V, F>(generator: F) -> Memoized<[P], V, ArgsMap<P, V>, F>
where
    P: std::hash::Hash + Eq + Clone,
    V: Clone,
    F: Fn(&[P]) -> V,
{
    Memoized::new(generator, ArgsMap::new())
}

/// Memoizes `generator` keyed by deep equality of its argument.
///
/// Lookups scan all cached keys, see [`DequalMap`].
pub fn memoize_dequal<K, V, F>(generator: F) -> Memoized<K, V, DequalMap<K, V>, F>
where
    K: PartialEq + Clone,
    V: Clone,
    F: Fn(&K) -> V,
{
    Memoized::new(generator, DequalMap::new())
}

/// Memoizes `generator` keyed by the JSON encoding of its argument.
///
/// Callers are responsible for the encoding being stable, see [`StringifyMap`].
pub fn memoize_stringify<K, V, F>(generator: F) -> Memoized<K, V, StringifyMap<K, V>, F>
where
    K: serde::Serialize + ?Sized,
    V: Clone,
    F: Fn(&K) -> V,
{
    Memoized::new(generator, StringifyMap::new())
}

/// Memoizes `generator` using a custom `cache`.
pub fn with_cache<K, V, C, F>(generator: F, cache: C) -> Memoized<K, V, C, F>
where
    K: ?Sized,
    V: Clone,
    C: MemoCache<K, V>,
    F: Fn(&K) -> V,
{
    Memoized::new(generator, cache)
}

/// Memoizes a function without arguments.
pub fn memoize_argless<V, F>(generator: F) -> MemoizedArgless<V, F>
where
    V: Clone,
    F: Fn() -> V,
{
    MemoizedArgless::new(generator)
}

/// Memoizes a fallible `generator` keyed by its argument list, without caching errors.
pub fn try_memoize<P, V, E, F>(generator: F) -> TryMemoized<[P], V, E, ArgsMap<P, V>, F>
where
    P: std::hash::Hash + Eq + Clone,
    V: Clone,
    F: Fn(&[P]) -> Result<V, E>,
{
    TryMemoized::new(generator, ArgsMap::new())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::OnceLock;

    use helpers_test::Counter;
    use serde::Serialize;
    use serde_json::json;

    use super::*;
    use crate::args;
    use crate::caching::ArgKey;
    use crate::metrics::capture;

    #[test]
    fn test_memoize_hits() {
        let calls = Counter::new();
        let add = memoize(|args: &[u32]| {
            calls.hit();
            args.iter().sum::<u32>()
        });

        assert_eq!(add.call(&[1, 2]), 3);
        assert_eq!(add.call(&[1, 2]), 3);
        assert_eq!(calls.get(), 1);

        assert_eq!(add.call(&[2, 1]), 3);
        assert_eq!(add.call(&[1, 2, 0]), 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_clear_key_and_clear() {
        let calls = Counter::new();
        let double = memoize(|args: &[i64]| {
            calls.hit();
            args[0] * 2
        });

        double.call(&[1]);
        double.call(&[2]);
        assert!(double.clear_key(&[1]));
        assert!(!double.has(&[1]));
        assert!(double.has(&[2]));

        double.call(&[1]);
        double.call(&[2]);
        assert_eq!(calls.get(), 3);

        double.clear();
        assert!(!double.has(&[2]));
        double.call(&[2]);
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_recursive_generator() {
        type Fib = Memoized<[u64], u64, ArgsMap<u64, u64>, fn(&[u64]) -> u64>;

        fn compute(args: &[u64]) -> u64 {
            match args[0] {
                0 | 1 => args[0],
                n => fib().call(&[n - 1]) + fib().call(&[n - 2]),
            }
        }

        fn fib() -> &'static Fib {
            static FIB: OnceLock<Fib> = OnceLock::new();
            FIB.get_or_init(|| Memoized::new(compute as fn(&[u64]) -> u64, ArgsMap::new()))
        }

        assert_eq!(fib().call(&[80]), 23_416_728_348_467_685);
    }

    #[test]
    fn test_mixed_args() {
        let calls = Counter::new();
        let describe = memoize(|args: &[ArgKey]| {
            calls.hit();
            format!("{args:?}")
        });

        describe.call(&args!["a", 1u8]);
        describe.call(&args!["a", 1u8]);
        describe.call(&args!["a", 1i8]);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_memoize_dequal() {
        let calls = Counter::new();
        let keys = memoize_dequal(|value: &serde_json::Value| {
            calls.hit();
            value.as_object().map_or(0, |object| object.len())
        });

        assert_eq!(keys.call(&json!({"a": 1, "b": 2})), 2);
        assert_eq!(keys.call(&json!({"b": 2, "a": 1})), 2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_memoize_stringify() {
        #[derive(Serialize)]
        struct Page {
            offset: u32,
            limit: u32,
        }

        let calls = Counter::new();
        let end = memoize_stringify(|page: &Page| {
            calls.hit();
            page.offset + page.limit
        });

        assert_eq!(end.call(&Page { offset: 10, limit: 5 }), 15);
        assert_eq!(end.call(&Page { offset: 10, limit: 5 }), 15);
        assert_eq!(calls.get(), 1);

        assert!(end.clear_key(&Page { offset: 10, limit: 5 }));
        end.call(&Page { offset: 10, limit: 5 });
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_memoize_argless() {
        let calls = Cell::new(0);
        let value = memoize_argless(|| {
            calls.set(calls.get() + 1);
            calls.get()
        });

        assert!(!value.has());
        assert_eq!(value.call(), 1);
        assert_eq!(value.call(), 1);

        value.clear();
        assert_eq!(value.call(), 2);
    }

    #[test]
    fn test_try_memoize_skips_errors() {
        let calls = Counter::new();
        let parse = try_memoize(|args: &[&str]| {
            calls.hit();
            args[0].parse::<u32>()
        });

        assert!(parse.call(&["x"]).is_err());
        assert!(!parse.has(&["x"]));
        assert!(parse.call(&["x"]).is_err());
        assert_eq!(calls.get(), 2);

        assert_eq!(parse.call(&["7"]), Ok(7));
        assert_eq!(parse.call(&["7"]), Ok(7));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_custom_cache() {
        let upper = with_cache(|s: &String| s.to_uppercase(), DequalMap::new());
        assert_eq!(upper.call(&"a".to_owned()), "A");
        assert!(upper.has(&"a".to_owned()));
    }

    #[test]
    fn test_metrics() {
        let captured = capture();
        let square = memoize(|args: &[u32]| args[0] * args[0]);
        square.call(&[3]);
        square.call(&[3]);

        assert_eq!(captured.lines("memoize.miss"), ["test.memoize.miss:1|c"]);
        assert_eq!(captured.lines("memoize.hit"), ["test.memoize.hit:1|c"]);
        assert_eq!(captured.lines("memoize.generate").len(), 1);
    }
}
