use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::Shared;

/// Execute a callback on dropping of the container type.
///
/// The callback must not panic under any circumstance. Since it is called while dropping an item,
/// this might result in aborting program execution.
pub struct CallOnDrop {
    f: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl CallOnDrop {
    /// Creates a new `CallOnDrop`.
    pub fn new<F: FnOnce() + Send + 'static>(f: F) -> CallOnDrop {
        CallOnDrop {
            f: Some(Box::new(f)),
        }
    }
}

impl Drop for CallOnDrop {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f();
        }
    }
}

/// A [`Shared`] future that stays pending forever if its source went away.
///
/// [`Shared`] panics when polled again after completion, and this wrapper also fuses it: once it
/// has produced a value or has been abandoned, it is never polled again.
pub(crate) struct AbandonOnCancel<Fut: Future> {
    inner: Option<Shared<Fut>>,
}

impl<Fut: Future> AbandonOnCancel<Fut> {
    pub(crate) fn new(inner: Shared<Fut>) -> Self {
        Self { inner: Some(inner) }
    }
}

impl<T, E, Fut> Future for AbandonOnCancel<Fut>
where
    Fut: Future<Output = Result<T, E>>,
    T: Clone,
    E: Clone,
{
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let Some(inner) = self.inner.as_mut() else {
            return Poll::Pending;
        };

        match Pin::new(inner).poll(cx) {
            Poll::Ready(result) => {
                self.inner = None;
                match result {
                    Ok(value) => Poll::Ready(value),
                    Err(_) => Poll::Pending,
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
