use std::borrow::Borrow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::caching::{ArgsMap, DequalMap, MemoCache, SingleSlot, StringifyMap};

/// The future returned by a memoized async function.
///
/// All callers for the same key share one of these, and thus one underlying computation.
pub type MemoFuture<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// A computation stored in the cache of an [`AsyncMemoized`].
///
/// The `id` identifies the call that created the computation, so that a failing computation
/// only evicts its own entry and never one that replaced it in the meantime.
pub struct Computation<V, E> {
    id: u64,
    future: MemoFuture<V, E>,
}

impl<V, E> Clone for Computation<V, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            future: self.future.clone(),
        }
    }
}

/// Wraps `computation` so that it calls `evict` when it resolves to an error.
fn evicting<V, E, Fut, F>(computation: Fut, evict: F) -> MemoFuture<V, E>
where
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    F: FnOnce() + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    async move {
        let result = computation.await;
        if result.is_err() {
            evict();
        }
        result
    }
    .boxed()
    .shared()
}

/// Removes the computation stored for `key`, if it is still the one with `id`.
fn evict<K, V, E, C>(cache: &Mutex<C>, key: &K, id: u64)
where
    K: ?Sized,
    C: MemoCache<K, Computation<V, E>>,
{
    let mut cache = cache.lock();
    if cache.get(key).is_some_and(|computation| computation.id == id) {
        cache.delete(key);
        metric!(counter("memoize.evicted") += 1);
        tracing::debug!("Evicted failed memoized computation");
    }
}

/// A memoized asynchronous function.
///
/// The first call for a key invokes the generator and stores the resulting computation. Every
/// further call for the same key, including concurrent ones, gets a handle to the same
/// computation. A successful result stays cached until it is cleared explicitly. A failed one is
/// evicted as soon as it settles, so the next call retries, while all callers that joined the
/// failed computation observe the same error.
///
/// The generator is called with the cache locked. It must return its future without awaiting
/// anything and must not call back into the same memoized function.
pub struct AsyncMemoized<K: ?Sized, V, E, C, F> {
    generator: F,
    cache: Arc<Mutex<C>>,
    next_id: AtomicU64,
    _key: PhantomData<fn(&K) -> Result<V, E>>,
}

impl<K, V, E, C, F, Fut> AsyncMemoized<K, V, E, C, F>
where
    K: ToOwned + ?Sized,
    K::Owned: Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: MemoCache<K, Computation<V, E>> + Send + 'static,
    F: Fn(&K) -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    /// Memoizes `generator` using a custom `cache`.
    pub fn new(generator: F, cache: C) -> Self {
        Self {
            generator,
            cache: Arc::new(Mutex::new(cache)),
            next_id: AtomicU64::new(0),
            _key: PhantomData,
        }
    }

    pub fn call(&self, key: &K) -> MemoFuture<V, E> {
        let mut cache = self.cache.lock();
        if let Some(computation) = cache.get(key) {
            metric!(counter("memoize.hit") += 1);
            tracing::trace!("Memoized value hit");
            return computation.future.clone();
        }

        metric!(counter("memoize.miss") += 1);
        tracing::trace!("Memoized value miss");
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let computation = (self.generator)(key);

        // the future must not keep its own cache alive
        let weak_cache: Weak<Mutex<C>> = Arc::downgrade(&self.cache);
        let owned_key = key.to_owned();
        let future = evicting(computation, move || {
            if let Some(cache) = weak_cache.upgrade() {
                evict::<K, V, E, C>(&cache, owned_key.borrow(), id);
            }
        });

        cache.set(
            key,
            Computation {
                id,
                future: future.clone(),
            },
        );
        future
    }

    /// Whether a computation for `key` is cached, either still running or resolved successfully.
    pub fn has(&self, key: &K) -> bool {
        self.cache.lock().has(key)
    }

    /// Forgets the computation for `key`.
    ///
    /// Callers already awaiting it are not affected.
    pub fn clear_key(&self, key: &K) -> bool {
        self.cache.lock().delete(key)
    }

    pub fn clear(&self) {
        self.cache.lock().clear()
    }
}

/// A memoized asynchronous function without arguments.
///
/// See [`AsyncMemoized`] for the caching and eviction rules.
pub struct AsyncMemoizedArgless<V, E, F> {
    generator: F,
    slot: Arc<Mutex<SingleSlot<Computation<V, E>>>>,
    next_id: AtomicU64,
}

impl<V, E, F, Fut> AsyncMemoizedArgless<V, E, F>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    pub fn new(generator: F) -> Self {
        Self {
            generator,
            slot: Arc::new(Mutex::new(SingleSlot::new())),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn call(&self) -> MemoFuture<V, E> {
        let mut slot = self.slot.lock();
        if let Some(computation) = slot.get(&()) {
            return computation.future.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let weak_slot = Arc::downgrade(&self.slot);
        let future = evicting((self.generator)(), move || {
            if let Some(slot) = weak_slot.upgrade() {
                evict::<(), V, E, _>(&slot, &(), id);
            }
        });

        slot.set(
            &(),
            Computation {
                id,
                future: future.clone(),
            },
        );
        future
    }

    pub fn has(&self) -> bool {
        self.slot.lock().has(&())
    }

    pub fn clear(&self) {
        self.slot.lock().clear()
    }
}

/// Memoizes an async `generator` keyed by its argument list.
pub fn memoize_async<P, V, E, F, Fut>(
    generator: F,
) -> AsyncMemoized<[P], V, E, ArgsMap<P, Computation<V, E>>, F>
where
    P: std::hash::Hash + Eq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(&[P]) -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    AsyncMemoized::new(generator, ArgsMap::new())
}

/// Memoizes an async `generator` keyed by deep equality of its argument.
pub fn memoize_async_dequal<K, V, E, F, Fut>(
    generator: F,
) -> AsyncMemoized<K, V, E, DequalMap<K, Computation<V, E>>, F>
where
    K: PartialEq + Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(&K) -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    AsyncMemoized::new(generator, DequalMap::new())
}

/// Memoizes an async `generator` keyed by the JSON encoding of its argument.
pub fn memoize_async_stringify<K, V, E, F, Fut>(
    generator: F,
) -> AsyncMemoized<K, V, E, StringifyMap<K, Computation<V, E>>, F>
where
    K: serde::Serialize + ToOwned + ?Sized + 'static,
    K::Owned: Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn(&K) -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    AsyncMemoized::new(generator, StringifyMap::new())
}

/// Memoizes an async `generator` using a custom `cache`.
pub fn with_async_cache<K, V, E, C, F, Fut>(
    generator: F,
    cache: C,
) -> AsyncMemoized<K, V, E, C, F>
where
    K: ToOwned + ?Sized,
    K::Owned: Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: MemoCache<K, Computation<V, E>> + Send + 'static,
    F: Fn(&K) -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    AsyncMemoized::new(generator, cache)
}

/// Memoizes an async function without arguments.
pub fn memoize_async_argless<V, E, F, Fut>(generator: F) -> AsyncMemoizedArgless<V, E, F>
where
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    AsyncMemoizedArgless::new(generator)
}
