//! Small caching and synchronization primitives.
//!
//! The building blocks are the keyed caches in [`caching`] ([`ArgsMap`], [`DequalMap`] and
//! [`StringifyMap`]), which back the memoization wrappers in [`memo`] and the in-flight call
//! coalescing in [`debounce`]. The [`sync`] module holds a FIFO [`Semaphore`] and the
//! externally resolvable [`Promize`], and [`retry`] re-runs fallible operations with jittered
//! delays.

#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod debounce;
pub mod events;
pub mod logging;
pub mod memo;
pub mod objects;
pub mod retry;
pub mod sync;
pub mod utils;

pub use caching::{ArgKey, ArgsMap, DequalMap, MemoCache, StringifyMap};
pub use debounce::{debounce, debounce_argless};
pub use memo::{memoize, memoize_async, memoize_dequal, memoize_stringify};
pub use retry::{RetryConfig, retry};
pub use sync::{Permit, Promize, Semaphore, Signal};
