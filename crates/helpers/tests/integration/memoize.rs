use std::sync::Arc;
use std::time::Duration;

use helpers::memo::{memoize_async, memoize_async_dequal};
use helpers_test::{Counter, setup};
use serde_json::{Value, json};

#[tokio::test(start_paused = true)]
async fn test_concurrent_tasks_load_once() {
    setup();

    let loads = Counter::new();
    let load = Arc::new(memoize_async({
        let loads = loads.clone();
        move |args: &[u64]| {
            loads.hit();
            let id = args[0];
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok::<_, String>(format!("user {id}"))
            }
        }
    }));

    let tasks: Vec<_> = (0..10)
        .map(|index| {
            let load = Arc::clone(&load);
            tokio::spawn(async move { load.call(&[index % 2]).await })
        })
        .collect();

    for (index, task) in tasks.into_iter().enumerate() {
        let expected = format!("user {}", index % 2);
        assert_eq!(task.await.unwrap(), Ok(expected));
    }
    assert_eq!(loads.get(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_load_is_retried_by_next_caller() {
    setup();

    let loads = Counter::new();
    let load = memoize_async_dequal({
        let loads = loads.clone();
        move |query: &Value| {
            let attempt = loads.hit();
            let query = query.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                match attempt {
                    0 => Err("backend unavailable"),
                    _ => Ok(query["limit"].as_u64().unwrap_or_default()),
                }
            }
        }
    });

    let query = json!({"table": "users", "limit": 10});
    assert_eq!(load.call(&query).await, Err("backend unavailable"));
    assert!(!load.has(&query));

    let same_query = json!({"limit": 10, "table": "users"});
    assert_eq!(load.call(&same_query).await, Ok(10));
    assert_eq!(load.call(&query).await, Ok(10));
    assert_eq!(loads.get(), 2);
}
