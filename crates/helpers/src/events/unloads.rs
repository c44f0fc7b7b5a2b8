use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Entries = Mutex<Vec<Unload>>;

struct UnloadInner {
    source: String,
    action: Box<dyn Fn() + Send + Sync>,
    sets: Vec<Weak<Entries>>,
}

/// Undoes one registration, such as an event listener.
///
/// An unload is a member of one or more [`Unloads`] sets. Running it performs its action and
/// removes it from all of them.
#[derive(Clone)]
pub struct Unload {
    inner: Arc<UnloadInner>,
}

impl Unload {
    pub(crate) fn new<F>(source: String, sets: &[&Unloads], action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let unload = Self {
            inner: Arc::new(UnloadInner {
                source,
                action: Box::new(action),
                sets: sets.iter().map(|set| Arc::downgrade(&set.entries)).collect(),
            }),
        };
        for set in sets {
            set.entries.lock().push(unload.clone());
        }
        unload
    }

    /// Describes what this unload undoes, for example `socket.on("data")`.
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    pub fn run(&self) {
        tracing::trace!(source = self.source(), "Running unload");
        (self.inner.action)();
        self.forget();
    }

    /// Removes this unload from all its sets without running it.
    pub(crate) fn forget(&self) {
        for set in &self.inner.sets {
            if let Some(entries) = set.upgrade() {
                entries
                    .lock()
                    .retain(|unload| !Arc::ptr_eq(&unload.inner, &self.inner));
            }
        }
    }

    fn same(&self, other: &Unload) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Unload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unload").field(&self.inner.source).finish()
    }
}

/// A set of pending [`Unload`]s owned by the caller, for example per connection or component.
///
/// Clones share the same set.
#[derive(Clone, Default)]
pub struct Unloads {
    entries: Arc<Entries>,
}

impl Unloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a custom unload to this set.
    pub fn push<F>(&self, source: impl Into<String>, action: F) -> Unload
    where
        F: Fn() + Send + Sync + 'static,
    {
        Unload::new(source.into(), &[self], action)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, unload: &Unload) -> bool {
        self.entries.lock().iter().any(|entry| entry.same(unload))
    }

    /// The sources of all pending unloads, in insertion order.
    pub fn sources(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|unload| unload.source().to_owned())
            .collect()
    }

    /// Runs all pending unloads, which also removes them from this and all other sets.
    pub fn run_all(&self) {
        let pending = self.entries.lock().clone();
        tracing::debug!(count = pending.len(), "Running unloads");
        for unload in pending {
            unload.run();
        }
    }
}

impl fmt::Debug for Unloads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.lock().iter()).finish()
    }
}
