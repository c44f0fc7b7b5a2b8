use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

type Listener<V> = Arc<dyn Fn(&V) + Send + Sync>;

/// Identifies a listener registered on an [`EventEmitter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration<V> {
    id: ListenerId,
    once: bool,
    listener: Listener<V>,
}

/// An emitter of named events carrying a value of type `V`.
///
/// Listeners are called in registration order. They run after the emitter's internal lock has
/// been released, so a listener may register or remove listeners on the same emitter.
pub struct EventEmitter<V> {
    listeners: Mutex<HashMap<String, Vec<Registration<V>>>>,
    next_id: AtomicU64,
}

impl<V> EventEmitter<V> {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn register<F>(&self, event: &str, once: bool, listener: F) -> ListenerId
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_owned())
            .or_default()
            .push(Registration {
                id,
                once,
                listener: Arc::new(listener),
            });
        id
    }

    /// Registers `listener` for every emission of `event`.
    pub fn on<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.register(event, false, listener)
    }

    /// Registers `listener` for the next emission of `event` only.
    pub fn once<F>(&self, event: &str, listener: F) -> ListenerId
    where
        F: Fn(&V) + Send + Sync + 'static,
    {
        self.register(event, true, listener)
    }

    /// Removes a listener, returning whether it was still registered.
    pub fn remove_listener(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(registrations) = listeners.get_mut(event) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            listeners.remove(event);
        }
        removed
    }

    /// Calls all listeners of `event` with `value`, returning how many were called.
    pub fn emit(&self, event: &str, value: &V) -> usize {
        let called: Vec<Listener<V>> = {
            let mut listeners = self.listeners.lock();
            let Some(registrations) = listeners.get_mut(event) else {
                return 0;
            };

            let called = registrations
                .iter()
                .map(|registration| Arc::clone(&registration.listener))
                .collect();
            registrations.retain(|registration| !registration.once);
            if registrations.is_empty() {
                listeners.remove(event);
            }
            called
        };

        for listener in &called {
            listener(value);
        }
        called.len()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

impl<V> Default for EventEmitter<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for EventEmitter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        let counts: HashMap<_, _> = listeners
            .iter()
            .map(|(event, registrations)| (event, registrations.len()))
            .collect();
        f.debug_struct("EventEmitter")
            .field("listeners", &counts)
            .finish()
    }
}
