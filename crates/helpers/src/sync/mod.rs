//! Async synchronization primitives, and the observable [`Signal`].

mod promize;
mod semaphore;
mod signal;

pub use promize::*;
pub use semaphore::*;
pub use signal::*;
