use std::sync::Arc;
use std::time::Duration;

use helpers::Promize;
use helpers_test::setup;

#[tokio::test]
async fn test_resolve_from_other_task() {
    setup();

    let ready = Arc::new(Promize::<&str>::new());
    let waiter = tokio::spawn({
        let ready = Arc::clone(&ready);
        async move { ready.wait().await }
    });

    tokio::task::yield_now().await;
    assert!(ready.resolve("go"));
    assert_eq!(waiter.await.unwrap(), Ok("go"));
}

#[tokio::test(start_paused = true)]
async fn test_reset_while_waiting() {
    setup();

    let ready = Arc::new(Promize::<u32, String>::new());
    let abandoned = tokio::spawn({
        let ready = Arc::clone(&ready);
        async move { tokio::time::timeout(Duration::from_secs(5), ready.wait()).await }
    });
    tokio::task::yield_now().await;

    ready.reset();
    let current = tokio::spawn({
        let ready = Arc::clone(&ready);
        async move { ready.wait().await }
    });
    tokio::task::yield_now().await;
    ready.reject("failed".into());

    assert_eq!(current.await.unwrap(), Err("failed".to_owned()));
    assert!(abandoned.await.unwrap().is_err());
}
