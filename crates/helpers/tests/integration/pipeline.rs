//! Combinations of the primitives, the way services tend to stack them.

use std::sync::Arc;
use std::time::Duration;

use helpers::{Semaphore, debounce_argless, retry};
use helpers_test::{Counter, ConcurrencyProbe, setup};
use parking_lot::Mutex;

use crate::flaky;

#[tokio::test(start_paused = true)]
async fn test_debounced_retry() {
    setup();

    let attempts = Counter::new();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let operation = flaky(2, attempts.clone());

    let refresh = debounce_argless({
        let errors = Arc::clone(&errors);
        move || {
            let operation = operation.clone();
            let errors = Arc::clone(&errors);
            async move {
                retry(operation)
                    .on_err(move |error, retries| errors.lock().push((error.clone(), retries)))
                    .max_retries(5)
                    .timeout_multiplier(Duration::from_millis(20))
                    .run()
                    .await
            }
        }
    });

    let (a, b, c) = futures::join!(refresh.call(), refresh.call(), refresh.call());
    assert_eq!(a, Ok(2));
    assert_eq!(b, Ok(2));
    assert_eq!(c, Ok(2));
    assert_eq!(attempts.get(), 3);
    assert_eq!(errors.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_retry_under_semaphore() {
    setup();

    let semaphore = Semaphore::new(1);
    let probe = ConcurrencyProbe::new();
    let attempts = Counter::new();

    let run = |failures| {
        let semaphore = semaphore.clone();
        let probe = probe.clone();
        let operation = flaky(failures, attempts.clone());
        async move {
            semaphore
                .with(|| async {
                    let _guard = probe.enter();
                    retry(operation)
                        .timeout_multiplier(Duration::from_millis(10))
                        .max_retries(3)
                        .run()
                        .await
                })
                .await
        }
    };

    let (first, second) = futures::join!(run(1), run(0));
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(probe.max(), 1);
}
