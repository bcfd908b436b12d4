// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn enqueue_delivers_in_order() {
    let (queue, mut rx) = WorkQueue::new();
    queue.enqueue("default/a");
    queue.enqueue("default/b");
    assert_eq!(rx.recv().await.unwrap(), "default/a");
    assert_eq!(rx.recv().await.unwrap(), "default/b");
}

#[tokio::test(start_paused = true)]
async fn enqueue_after_waits_for_the_delay() {
    let (queue, mut rx) = WorkQueue::new();
    queue.enqueue_after("default/a", Duration::from_secs(5));

    // Nothing before the delay elapses.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(rx.recv().await.unwrap(), "default/a");
}

#[tokio::test]
async fn enqueue_after_receiver_dropped_is_silent() {
    let (queue, rx) = WorkQueue::new();
    drop(rx);
    queue.enqueue("default/a");
    queue.enqueue_after("default/b", Duration::from_millis(1));
    tokio::time::sleep(Duration::from_millis(5)).await;
}
