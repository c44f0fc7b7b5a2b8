use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::FuturesUnordered;
use parking_lot::Mutex;

use super::{Unload, Unloads};

type Receiver<V, E> = Arc<dyn Fn(&V) -> BoxFuture<'static, Result<(), E>> + Send + Sync>;

struct Registry<V, E> {
    receivers: Mutex<Vec<(u64, Receiver<V, E>)>>,
    next_id: AtomicU64,
}

/// The receiving side of an emitter created by [`register_emitter`].
///
/// Clones register into the same emitter.
pub struct Receivers<V, E = anyhow::Error> {
    registry: Arc<Registry<V, E>>,
}

/// The emitting side of an emitter created by [`register_emitter`].
pub struct Emitter<V, E = anyhow::Error> {
    registry: Arc<Registry<V, E>>,
}

/// Creates an emitter of `V` values, returning its receiving and emitting sides.
///
/// Receivers are registered together with an [`Unload`] in the caller's [`Unloads`], and
/// [`Emitter::emit`] waits for all of them, passing their errors to a handler.
pub fn register_emitter<V, E>() -> (Receivers<V, E>, Emitter<V, E>) {
    let registry = Arc::new(Registry {
        receivers: Mutex::new(Vec::new()),
        next_id: AtomicU64::new(0),
    });
    (
        Receivers {
            registry: Arc::clone(&registry),
        },
        Emitter { registry },
    )
}

/// Like [`register_emitter`], but hands the emitting side to `setup` and only returns the
/// receiving side.
pub fn register_emitter_with<V, E, F>(setup: F) -> Receivers<V, E>
where
    F: FnOnce(Emitter<V, E>),
{
    let (receivers, emitter) = register_emitter();
    setup(emitter);
    receivers
}

impl<V: 'static, E: Send + 'static> Receivers<V, E> {
    fn add(&self, unloads: &Unloads, receiver: Receiver<V, E>) -> Unload {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.receivers.lock().push((id, receiver));

        let registry = Arc::downgrade(&self.registry);
        unloads.push(format!("receiver#{id}"), move || {
            if let Some(registry) = registry.upgrade() {
                registry
                    .receivers
                    .lock()
                    .retain(|(receiver_id, _)| *receiver_id != id);
            }
        })
    }

    /// Registers an async `receiver`.
    ///
    /// The receiver is removed when the returned [`Unload`] runs, for example through
    /// [`Unloads::run_all`].
    pub fn on<F, Fut>(&self, unloads: &Unloads, receiver: F) -> Unload
    where
        F: Fn(&V) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        let receiver: Receiver<V, E> = Arc::new(move |value: &V| receiver(value).boxed());
        self.add(unloads, receiver)
    }

    /// Registers a synchronous `receiver`, see [`on`](Self::on).
    pub fn on_sync<F>(&self, unloads: &Unloads, receiver: F) -> Unload
    where
        F: Fn(&V) -> Result<(), E> + Send + Sync + 'static,
    {
        let receiver: Receiver<V, E> =
            Arc::new(move |value: &V| futures::future::ready(receiver(value)).boxed());
        self.add(unloads, receiver)
    }

    pub fn len(&self) -> usize {
        self.registry.receivers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.receivers.lock().is_empty()
    }
}

impl<V, E> Emitter<V, E> {
    /// Calls all receivers with `value` and waits until all of them completed.
    ///
    /// Every receiver runs, regardless of errors in others. Errors are passed to `on_error` as
    /// the receivers fail. Returns the number of receivers called.
    pub async fn emit<H>(&self, value: &V, mut on_error: H) -> usize
    where
        H: FnMut(E),
    {
        let receivers: Vec<Receiver<V, E>> = self
            .registry
            .receivers
            .lock()
            .iter()
            .map(|(_, receiver)| Arc::clone(receiver))
            .collect();

        let mut pending: FuturesUnordered<_> =
            receivers.iter().map(|receiver| receiver(value)).collect();
        while let Some(result) = pending.next().await {
            if let Err(error) = result {
                on_error(error);
            }
        }

        tracing::trace!(receivers = receivers.len(), "Emitted event");
        receivers.len()
    }
}

impl<V, E> Clone for Receivers<V, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<V, E> Clone for Emitter<V, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<V, E> fmt::Debug for Receivers<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receivers")
            .field("len", &self.registry.receivers.lock().len())
            .finish()
    }
}

impl<V, E> fmt::Debug for Emitter<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("receivers", &self.registry.receivers.lock().len())
            .finish()
    }
}
