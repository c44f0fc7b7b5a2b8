use std::sync::Arc;
use std::time::Duration;

use helpers::Semaphore;
use helpers_test::{ConcurrencyProbe, setup};
use parking_lot::Mutex;

use crate::poll_once;

#[tokio::test]
async fn test_fifo_release_order() {
    setup();

    let semaphore = Semaphore::new(1);
    let holder = semaphore.obtain().await;

    let mut waiters: Vec<_> = (0..3).map(|_| Box::pin(semaphore.obtain())).collect();
    for waiter in &mut waiters {
        assert!(poll_once(waiter).is_none());
    }
    assert_eq!(semaphore.waiting(), 3);

    let mut held = holder;
    for index in 0..3 {
        // releasing hands the slot to the front of the queue only
        drop(held);
        for later in &mut waiters[index + 1..] {
            assert!(poll_once(later).is_none());
        }
        held = poll_once(&mut waiters[index]).expect("permit handed to the next waiter");
    }

    drop(held);
    assert_eq!(semaphore.available(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capacity_bounds_concurrency() {
    setup();

    let semaphore = Semaphore::new(2);
    let probe = ConcurrencyProbe::new();
    let finished = Arc::new(Mutex::new(Vec::new()));

    let tasks: Vec<_> = (0..6)
        .map(|index| {
            let semaphore = semaphore.clone();
            let probe = probe.clone();
            let finished = Arc::clone(&finished);
            tokio::spawn(async move {
                semaphore
                    .with(|| async {
                        let _guard = probe.enter();
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        finished.lock().push(index);
                    })
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(probe.max(), 2);
    assert_eq!(probe.current(), 0);
    assert_eq!(finished.lock().len(), 6);
    assert_eq!(semaphore.available(), 2);
}

#[tokio::test]
async fn test_cancelled_task_releases() {
    let semaphore = Semaphore::new(1);

    let task = tokio::spawn({
        let semaphore = semaphore.clone();
        async move {
            semaphore
                .with(futures::future::pending::<()>)
                .await
        }
    });
    tokio::task::yield_now().await;
    assert_eq!(semaphore.available(), 0);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(semaphore.available(), 1);
}
