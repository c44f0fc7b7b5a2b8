// See <https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html>

pub mod config;
pub mod events;
pub mod memoize;
pub mod pipeline;
pub mod promize;
pub mod semaphore;
pub mod utils;

pub use utils::*;
