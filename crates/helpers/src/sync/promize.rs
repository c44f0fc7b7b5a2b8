use std::convert::Infallible;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;
use parking_lot::Mutex;

use crate::utils::futures::AbandonOnCancel;

/// One underlying promise of a [`Promize`].
struct Generation<T, E> {
    sender: Mutex<Option<oneshot::Sender<Result<T, E>>>>,
    receiver: Shared<oneshot::Receiver<Result<T, E>>>,
}

impl<T: Clone, E: Clone> Generation<T, E> {
    fn new() -> Arc<Self> {
        let (sender, receiver) = oneshot::channel();
        Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            receiver: receiver.shared(),
        })
    }

    fn settled(result: Result<T, E>) -> Arc<Self> {
        let generation = Self::new();
        generation.settle(result);
        generation
    }

    fn settle(&self, result: Result<T, E>) -> bool {
        match self.sender.lock().take() {
            Some(sender) => {
                // cannot fail, `self.receiver` is still alive
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }

    fn is_settled(&self) -> bool {
        self.sender.lock().is_none()
    }
}

/// A promise that can be settled from the outside and replaced.
///
/// Every waiter gets its own copy of the outcome, so both `T` and `E` must be [`Clone`].
///
/// Every [`wait`](Self::wait) observes the underlying promise that is current at the time of the
/// call. [`reset`](Self::reset) and [`set`](Self::set) replace the underlying promise. Callers
/// still waiting on the replaced one are abandoned: their futures never resolve, unless a
/// [`Resolver`] obtained before the replacement settles it.
pub struct Promize<T, E = Infallible> {
    current: Mutex<Arc<Generation<T, E>>>,
}

impl<T: Clone, E: Clone> Promize<T, E> {
    /// Creates a pending promise.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Generation::new()),
        }
    }

    /// Creates a promise that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        Self {
            current: Mutex::new(Generation::settled(Ok(value))),
        }
    }

    fn current(&self) -> Arc<Generation<T, E>> {
        Arc::clone(&self.current.lock())
    }

    /// Replaces the underlying promise with a resolved one, or with a pending one for `None`.
    pub fn set(&self, value: Option<T>) {
        let generation = match value {
            Some(value) => Generation::settled(Ok(value)),
            None => Generation::new(),
        };
        *self.current.lock() = generation;
    }

    /// Replaces the underlying promise with a pending one.
    pub fn reset(&self) {
        self.set(None)
    }

    /// Resolves the current promise, returns `false` if it was already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.current().settle(Ok(value))
    }

    /// Rejects the current promise, returns `false` if it was already settled.
    pub fn reject(&self, error: E) -> bool {
        self.current().settle(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        self.current().is_settled()
    }

    /// Returns a handle that settles the current promise, even after it has been replaced.
    pub fn resolver(&self) -> Resolver<T, E> {
        Resolver {
            generation: self.current(),
        }
    }

    /// Waits for the current promise to settle.
    pub fn wait(&self) -> Wait<T, E> {
        Wait {
            inner: AbandonOnCancel::new(self.current().receiver.clone()),
        }
    }
}

impl<T: Clone, E: Clone> Default for Promize<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, E: Clone> fmt::Debug for Promize<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promize")
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl<T: Clone, E: Clone> IntoFuture for &Promize<T, E> {
    type Output = Result<T, E>;
    type IntoFuture = Wait<T, E>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait()
    }
}

/// Settles one specific underlying promise of a [`Promize`].
pub struct Resolver<T, E = Infallible> {
    generation: Arc<Generation<T, E>>,
}

impl<T: Clone, E: Clone> Resolver<T, E> {
    pub fn resolve(&self, value: T) -> bool {
        self.generation.settle(Ok(value))
    }

    pub fn reject(&self, error: E) -> bool {
        self.generation.settle(Err(error))
    }

    pub fn is_settled(&self) -> bool {
        self.generation.is_settled()
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            generation: Arc::clone(&self.generation),
        }
    }
}

/// Future returned by [`Promize::wait`].
#[must_use = "futures do nothing unless polled"]
pub struct Wait<T, E> {
    inner: AbandonOnCancel<oneshot::Receiver<Result<T, E>>>,
}

impl<T: Clone, E: Clone> Future for Wait<T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_resolved() {
        let promize = Promize::<u32>::resolved(5);
        assert!(promize.is_settled());
        assert_eq!(promize.wait().await, Ok(5));
        assert_eq!((&promize).await, Ok(5));
    }

    #[tokio::test]
    async fn test_first_settlement_wins() {
        let promize = Promize::<u32, String>::new();
        let waiting = promize.wait();

        assert!(promize.resolve(1));
        assert!(!promize.resolve(2));
        assert!(!promize.reject("late".into()));

        assert_eq!(waiting.await, Ok(1));
        assert_eq!(promize.wait().await, Ok(1));
    }

    #[tokio::test]
    async fn test_reject() {
        let promize = Promize::<(), &str>::default();
        assert!(promize.reject("nope"));
        assert_eq!(promize.wait().await, Err("nope"));
    }

    #[tokio::test]
    async fn test_reset_requires_new_settlement() {
        let promize = Promize::<u32>::resolved(1);
        promize.reset();
        assert!(!promize.is_settled());
        assert!(promize.wait().now_or_never().is_none());

        promize.resolve(2);
        assert_eq!(promize.wait().await, Ok(2));

        promize.set(Some(3));
        assert_eq!(promize.wait().await, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_abandons_waiters() {
        let promize = Promize::<u32>::new();
        let abandoned = promize.wait();

        promize.reset();
        promize.resolve(1);

        let result = tokio::time::timeout(Duration::from_secs(60), abandoned).await;
        assert!(result.is_err());
        assert_eq!(promize.wait().await, Ok(1));
    }

    #[derive(Clone, Debug, PartialEq)]
    enum LoadError {
        NotFound(String),
    }

    fn fail_generic<T: Clone, E: Clone>(promize: &Promize<T, E>, error: E) -> Resolver<T, E> {
        let resolver = promize.resolver();
        resolver.reject(error);
        resolver
    }

    #[tokio::test]
    async fn test_custom_error_type() {
        let promize = Promize::<Vec<u8>, LoadError>::default();
        let waiting = promize.wait();

        let resolver = fail_generic(&promize, LoadError::NotFound("a".into()));
        assert!(!resolver.resolve(vec![1]));
        assert_eq!(format!("{promize:?}"), "Promize { settled: true }");

        assert_eq!(waiting.await, Err(LoadError::NotFound("a".into())));
        assert_eq!((&promize).await, Err(LoadError::NotFound("a".into())));
    }

    #[tokio::test]
    async fn test_resolver_outlives_reset() {
        let promize = Promize::<u32>::new();
        let resolver = promize.resolver();
        let old = promize.wait();

        promize.reset();
        assert!(resolver.clone().resolve(7));
        assert!(resolver.is_settled());

        assert_eq!(old.await, Ok(7));
        assert!(!promize.is_settled());
    }
}
