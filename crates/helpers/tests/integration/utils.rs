use std::future::Future;

use futures::FutureExt;
use helpers_test::Counter;

/// Polls `future` once, returning its output if it is ready right away.
pub fn poll_once<F: Future + Unpin>(future: &mut F) -> Option<F::Output> {
    future.now_or_never()
}

/// Creates an operation that fails `failures` times before succeeding with the attempt number.
///
/// Every invocation is counted in `attempts`.
pub fn flaky(
    failures: usize,
    attempts: Counter,
) -> impl Fn() -> futures::future::Ready<Result<usize, String>> + Clone + Send + Sync + 'static {
    move || {
        let attempt = attempts.hit();
        futures::future::ready(if attempt < failures {
            Err(format!("attempt {attempt} failed"))
        } else {
            Ok(attempt)
        })
    }
}
