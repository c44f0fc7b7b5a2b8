//! Event emitters whose listeners are tracked for later removal.
//!
//! Long-lived emitters easily accumulate listeners of components that are gone. Registering
//! through an [`EmitterWithUnloads`] records an [`Unload`] for every listener in the caller's
//! [`Unloads`], and optionally in an emitter-wide set, so that all listeners of a component can
//! be removed in one go with [`Unloads::run_all`].
//!
//! [`register_emitter`] creates a single-event emitter whose receivers may be async. Its
//! receivers are recorded in [`Unloads`] as well.

use std::ops::Deref;
use std::sync::{Arc, OnceLock};

mod emitter;
mod register;
mod unloads;

pub use emitter::*;
pub use register::*;
pub use unloads::*;

const DEFAULT_NAME: &str = "eventEmitter";

/// Wraps an [`EventEmitter`] so that every registration yields a tracked [`Unload`].
///
/// All other emitter operations are available through [`Deref`].
pub struct EmitterWithUnloads<V> {
    emitter: Arc<EventEmitter<V>>,
    emitter_unloads: Option<Unloads>,
    name: String,
}

impl<V: 'static> EmitterWithUnloads<V> {
    /// Wraps `emitter`.
    ///
    /// If `emitter_unloads` is given, every unload is also recorded there. `name` labels the
    /// sources of the unloads and defaults to `eventEmitter`.
    pub fn new(
        emitter: Arc<EventEmitter<V>>,
        emitter_unloads: Option<Unloads>,
        name: Option<&str>,
    ) -> Self {
        Self {
            emitter,
            emitter_unloads,
            name: name.unwrap_or(DEFAULT_NAME).to_owned(),
        }
    }

    pub fn emitter(&self) -> &Arc<EventEmitter<V>> {
        &self.emitter
    }

    /// Creates the unload for the listener registered as `id`, recorded in `unloads` and the
    /// emitter-wide set.
    fn track(
        &self,
        unloads: Option<&Unloads>,
        method: &str,
        event: &str,
        id: Arc<OnceLock<ListenerId>>,
    ) -> Unload {
        let sets: Vec<&Unloads> = unloads.into_iter().chain(&self.emitter_unloads).collect();
        let source = format!("{}.{method}(\"{event}\")", self.name);

        let emitter = Arc::downgrade(&self.emitter);
        let event = event.to_owned();
        Unload::new(source, &sets, move || {
            if let (Some(emitter), Some(id)) = (emitter.upgrade(), id.get()) {
                emitter.remove_listener(&event, *id);
            }
        })
    }

    /// Registers `listener` for every emission of `event`.
    pub fn on<F>(&self, unloads: Option<&Unloads>, event: &str, listener: F) -> &Self
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        let id = self.emitter.on(event, listener);
        self.track(unloads, "on", event, Arc::new(OnceLock::from(id)));
        self
    }

    /// Registers `listener` for the next emission of `event`.
    ///
    /// Once the listener fired, its unload is removed from the sets.
    pub fn once<F>(&self, unloads: Option<&Unloads>, event: &str, listener: F) -> &Self
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        // the unload must exist before the listener can fire
        let id = Arc::new(OnceLock::new());
        let unload = self.track(unloads, "once", event, Arc::clone(&id));

        let listener_id = self.emitter.once(event, move |value| {
            unload.forget();
            listener(value);
        });
        let _ = id.set(listener_id);
        self
    }
}

impl<V> Deref for EmitterWithUnloads<V> {
    type Target = EventEmitter<V>;

    fn deref(&self) -> &Self::Target {
        &self.emitter
    }
}
