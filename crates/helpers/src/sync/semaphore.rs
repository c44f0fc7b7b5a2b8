use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::channel::oneshot;
use parking_lot::Mutex;

struct State {
    available: usize,
    waiters: VecDeque<oneshot::Sender<Permit>>,
}

struct Inner {
    capacity: usize,
    state: Mutex<State>,
}

/// A counting semaphore that hands out permits in FIFO order.
///
/// [`obtain`](Self::obtain) resolves immediately while slots are free. Otherwise the caller is
/// queued, and a released permit is handed directly to the longest waiting caller, so a slot
/// freed by a release can never be taken by a caller that arrived later.
///
/// Cloning a semaphore yields another handle to the same slots.
#[derive(Clone)]
pub struct Semaphore {
    inner: Arc<Inner>,
}

impl Semaphore {
    /// Creates a semaphore with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                capacity,
                state: Mutex::new(State {
                    available: capacity,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Waits for a free slot and returns a permit for it.
    ///
    /// Dropping the returned future before it resolves gives up the place in the queue. A permit
    /// that was handed over in the meantime is released again.
    pub async fn obtain(&self) -> Permit {
        loop {
            let receiver = {
                let mut state = self.inner.state.lock();
                if state.available > 0 && state.waiters.is_empty() {
                    state.available -= 1;
                    return Permit::new(&self.inner);
                }

                let (sender, receiver) = oneshot::channel();
                state.waiters.push_back(sender);
                metric!(gauge("semaphore.waiting") = state.waiters.len() as u64);
                receiver
            };

            match receiver.await {
                Ok(permit) => return permit,
                // the sender was discarded without a permit, queue up again
                Err(oneshot::Canceled) => continue,
            }
        }
    }

    /// Obtains a permit, runs `f`, and releases the permit once `f`'s future completes.
    ///
    /// The permit is released on every exit path, including when the returned future is dropped
    /// or `f` panics.
    pub async fn with<F, Fut>(&self, f: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let _permit = self.obtain().await;
        f().await
    }

    /// The total number of slots.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// The number of slots not held by any permit.
    pub fn available(&self) -> usize {
        self.inner.state.lock().available
    }

    /// The number of callers queued for a slot.
    ///
    /// This may include callers that already gave up and have not been skipped yet.
    pub fn waiting(&self) -> usize {
        self.inner.state.lock().waiters.len()
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Semaphore")
            .field("capacity", &self.inner.capacity)
            .field("available", &state.available)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}

/// A held slot of a [`Semaphore`].
///
/// The slot is freed by [`release`](Self::release) or when the permit is dropped.
#[must_use = "the slot is released again when the permit is dropped"]
pub struct Permit {
    semaphore: Option<Arc<Inner>>,
}

impl Permit {
    fn new(inner: &Arc<Inner>) -> Self {
        Self {
            semaphore: Some(Arc::clone(inner)),
        }
    }

    /// Frees the slot and hands it to the first waiting caller.
    ///
    /// Releasing a permit more than once has no effect.
    pub fn release(&mut self) {
        let Some(inner) = self.semaphore.take() else {
            return;
        };

        let mut state = inner.state.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.is_canceled() {
                continue;
            }

            metric!(gauge("semaphore.waiting") = state.waiters.len() as u64);
            drop(state);
            // if the waiter went away just now, the returned permit is dropped and released again
            let _ = waiter.send(Permit::new(&inner));
            return;
        }

        metric!(gauge("semaphore.waiting") = 0u64);
        state.available += 1;
    }

    /// Whether this permit still holds its slot.
    pub fn is_held(&self) -> bool {
        self.semaphore.is_some()
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("held", &self.is_held())
            .finish()
    }
}
