//! Integration tests for the core-async facade.

use core_async::{sync, task, time};
use std::sync::Arc;

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    assert_eq!(handle.await.unwrap(), 42);
}

#[tokio::test]
async fn test_abort_and_join_cancels_pending_task() {
    let handle = task::spawn(async {
        time::sleep(time::Duration::from_secs(3600)).await;
    });
    assert!(task::abort_and_join(handle).await.is_ok());
}

#[tokio::test]
async fn test_abort_and_join_on_finished_task() {
    let handle = task::spawn(async { 7 });
    task::yield_now().await;
    assert!(task::abort_and_join(handle).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_delayed_interval_waits_for_grace_period() {
    let start = time::Instant::now();
    let mut ticker = time::delayed_interval(
        time::Duration::from_secs(2),
        time::Duration::from_secs(1),
    );

    ticker.tick().await;
    assert!(start.elapsed() >= time::Duration::from_secs(2));

    ticker.tick().await;
    assert!(start.elapsed() >= time::Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(100)).await;
    })
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_cancellation_token_wakes_waiters() {
    let token = sync::CancellationToken::new();
    let child = token.child_token();
    let waiter = task::spawn(async move {
        child.cancelled().await;
        true
    });
    token.cancel();
    assert!(waiter.await.unwrap());
}

#[tokio::test]
async fn test_watch_channel_keeps_latest_value() {
    let (tx, mut rx) = sync::watch::channel(0u32);
    tx.send(1).unwrap();
    tx.send(2).unwrap();
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), 2);
}

#[tokio::test]
async fn test_mutex_shared_across_tasks() {
    let counter = Arc::new(sync::Mutex::new(0));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let counter = Arc::clone(&counter);
        handles.push(task::spawn(async move {
            *counter.lock().await += 1;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(*counter.lock().await, 8);
}

#[test]
fn test_now_millis_is_monotonic_enough() {
    let first = time::now_millis();
    let second = time::now_millis();
    assert!(second >= first);
    assert!(time::now_secs() > 0);
}

#[test]
fn test_block_on_runs_future() {
    let value = core_async::runtime::block_on(async { 5 }).unwrap();
    assert_eq!(value, 5);
}
