use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Observer<T> = Arc<dyn Fn(&T, &T) + Send + Sync>;

struct State<T> {
    value: T,
    observers: Vec<(u64, Observer<T>)>,
    next_id: u64,
}

/// A value that notifies its observers when it changes.
///
/// Observers are called with `(next, previous)` after the value was replaced, and outside of the
/// internal lock, so they may read or set the signal themselves. Concurrent [`set`](Self::set)
/// calls from different threads may deliver their notifications in either order.
pub struct Signal<T> {
    state: Arc<Mutex<State<T>>>,
}

impl<T: Clone + PartialEq> Signal<T> {
    pub fn new(value: T) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                value,
                observers: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.state.lock().value.clone()
    }

    /// Replaces the value and notifies all observers.
    ///
    /// Setting a value equal to the current one does nothing and returns `false`.
    pub fn set(&self, next: T) -> bool {
        let (previous, observers) = {
            let mut state = self.state.lock();
            if state.value == next {
                return false;
            }
            let previous = std::mem::replace(&mut state.value, next.clone());
            let observers: Vec<_> = state
                .observers
                .iter()
                .map(|(_, observer)| Arc::clone(observer))
                .collect();
            (previous, observers)
        };

        tracing::trace!(observers = observers.len(), "Signal changed");
        for observer in observers {
            observer(&next, &previous);
        }
        true
    }

    /// Registers `observer` for all future changes.
    ///
    /// The observer is called right away with the current value as both `next` and `previous`.
    pub fn on_value<F>(&self, observer: F) -> Subscription<T>
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let observer: Observer<T> = Arc::new(observer);
        let (id, current) = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.observers.push((id, Arc::clone(&observer)));
            (id, state.value.clone())
        };

        observer(&current, &current);
        Subscription {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.state.lock().observers.len()
    }
}

impl<T: Clone + PartialEq + Default> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Signal")
            .field("value", &state.value)
            .field("observers", &state.observers.len())
            .finish()
    }
}

/// An observer registered with [`Signal::on_value`].
///
/// Dropping the subscription keeps the observer registered.
pub struct Subscription<T> {
    state: Weak<Mutex<State<T>>>,
    id: u64,
}

impl<T> Subscription<T> {
    /// Removes the observer, returning whether it was still registered.
    pub fn unsubscribe(self) -> bool {
        let Some(state) = self.state.upgrade() else {
            return false;
        };

        let mut state = state.lock();
        let before = state.observers.len();
        state.observers.retain(|(id, _)| *id != self.id);
        state.observers.len() != before
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscription").field(&self.id).finish()
    }
}
