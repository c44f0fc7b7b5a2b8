//! Coalescing of concurrent async calls.
//!
//! A debounced function shares one in-flight call between all callers that arrive while it is
//! running. Unlike [`memoize_async`](crate::memo::memoize_async), nothing is kept once the call
//! settles: the next call after that starts a fresh one.

use std::borrow::Borrow;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;

use crate::caching::{ArgsMap, MemoCache, SingleSlot};
use crate::utils::futures::CallOnDrop;

/// The future returned by a debounced function, shared by all joined callers.
pub type DebounceFuture<T> = Shared<BoxFuture<'static, T>>;

/// A registered in-flight call.
///
/// Only a weak handle is kept, so the call is dropped together with its last caller.
pub struct InFlight<T> {
    id: u64,
    future: WeakShared<BoxFuture<'static, T>>,
}

/// Joins the in-flight call for `key`, or starts a new one with `start`.
fn join_or_start<K, T, C, Fut>(
    calls: &Arc<Mutex<C>>,
    next_id: &AtomicU64,
    key: &K,
    start: impl FnOnce() -> Fut,
) -> DebounceFuture<T>
where
    K: ToOwned + ?Sized,
    K::Owned: Send + 'static,
    T: Clone + Send + Sync + 'static,
    C: MemoCache<K, InFlight<T>> + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let mut guard = calls.lock();
    if let Some(future) = guard.get(key).and_then(|call| call.future.upgrade()) {
        metric!(counter("debounce.joined") += 1);
        tracing::trace!("Joining in-flight call");
        return future;
    }

    metric!(counter("debounce.started") += 1);
    let id = next_id.fetch_add(1, Ordering::Relaxed);

    // unregisters the call once it completes, or once all callers dropped it
    let weak_calls = Arc::downgrade(calls);
    let owned_key = key.to_owned();
    let token = CallOnDrop::new(move || {
        if let Some(calls) = weak_calls.upgrade() {
            let mut calls = calls.lock();
            let key: &K = owned_key.borrow();
            if calls.get(key).is_some_and(|call| call.id == id) {
                calls.delete(key);
            }
        }
    });

    let computation = start();
    let future = async move {
        let _token = token;
        computation.await
    }
    .boxed()
    .shared();

    // `downgrade` only fails for completed futures, and this one was never polled
    if let Some(weak) = future.downgrade() {
        guard.set(key, InFlight { id, future: weak });
    }
    future
}

/// A debounced async function, see [`debounce`].
pub struct Debounced<P, T, F> {
    generator: F,
    calls: Arc<Mutex<ArgsMap<P, InFlight<T>>>>,
    next_id: AtomicU64,
}

impl<P, T, F, Fut> Debounced<P, T, F>
where
    P: std::hash::Hash + Eq + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(&[P]) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    /// Calls the function, or joins the call with equal arguments that is still running.
    pub fn call(&self, args: &[P]) -> DebounceFuture<T> {
        join_or_start(&self.calls, &self.next_id, args, || (self.generator)(args))
    }

    /// The number of distinct calls currently running.
    pub fn in_flight(&self) -> usize {
        self.calls.lock().len()
    }
}

/// A debounced async function that ignores its arguments, see [`debounce_argless`].
pub struct DebouncedArgless<T, F> {
    generator: F,
    call: Arc<Mutex<SingleSlot<InFlight<T>>>>,
    next_id: AtomicU64,
}

impl<T, F, Fut> DebouncedArgless<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    pub fn call(&self) -> DebounceFuture<T> {
        join_or_start(&self.call, &self.next_id, &(), || (self.generator)())
    }

    /// Whether a call is currently running.
    pub fn is_running(&self) -> bool {
        self.call.lock().has(&())
    }
}

/// Debounces an async `generator` keyed by its argument list.
///
/// Calls with equal arguments that overlap share one invocation of the generator. Once that
/// invocation settles, or all of its callers have dropped their futures, it is forgotten.
///
/// The generator is called while the set of running calls is locked. It must return its
/// future without awaiting anything and must not call back into the same debounced function.
pub fn debounce<P, T, F, Fut>(generator: F) -> Debounced<P, T, F>
where
    P: std::hash::Hash + Eq + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    F: Fn(&[P]) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    Debounced {
        generator,
        calls: Arc::new(Mutex::new(ArgsMap::new())),
        next_id: AtomicU64::new(0),
    }
}

/// Debounces an async `generator` so that at most one invocation runs at a time.
///
/// This is also the way to debounce a function whose arguments should not distinguish calls:
/// capture them in the closure.
pub fn debounce_argless<T, F, Fut>(generator: F) -> DebouncedArgless<T, F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    DebouncedArgless {
        generator,
        call: Arc::new(Mutex::new(SingleSlot::new())),
        next_id: AtomicU64::new(0),
    }
}
