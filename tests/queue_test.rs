use bulkstream::buffer::AsyncQueue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

#[tokio::test]
async fn pushes_then_pulls_preserve_fifo_order() {
    let queue = AsyncQueue::new();
    queue.push("A");
    queue.push("B");
    queue.push("C");

    assert_eq!(queue.pull(None).await, Some("A"));
    assert_eq!(queue.pull(None).await, Some("B"));
    assert_eq!(queue.pull(None).await, Some("C"));
}

#[tokio::test]
async fn pulls_parked_before_pushes_are_served_in_order() {
    let queue = Arc::new(AsyncQueue::new());

    // Park two pullers before anything is pushed; spawn order decides
    // which waiter registered first.
    let first = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.pull(None).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.pull(None).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(queue.len(), -2);

    queue.push(1);
    queue.push(2);

    assert_eq!(first.await.unwrap(), Some(1));
    assert_eq!(second.await.unwrap(), Some(2));
    assert_eq!(queue.len(), 0);
}

#[tokio::test]
async fn timed_out_pull_leaves_queue_unchanged() {
    let queue: AsyncQueue<u32> = AsyncQueue::new();

    let start = Instant::now();
    let pulled = queue.pull(Some(Duration::from_millis(100))).await;
    assert_eq!(pulled, None);
    assert!(start.elapsed() >= Duration::from_millis(100));
    assert_eq!(queue.len(), 0);

    // A subsequent push+pull pair still delivers the pushed item.
    queue.push(7);
    assert_eq!(queue.pull(Some(Duration::from_millis(100))).await, Some(7));
}

#[tokio::test]
async fn push_after_timeout_is_not_claimed_by_the_dead_waiter() {
    let queue = Arc::new(AsyncQueue::new());

    assert_eq!(queue.pull(Some(Duration::from_millis(20))).await, None);
    queue.push("late");

    // The timed-out waiter must not swallow the item.
    let pulled = timeout(Duration::from_millis(100), queue.pull(None))
        .await
        .expect("pull should complete");
    assert_eq!(pulled, Some("late"));
}

#[tokio::test]
async fn concurrent_producers_lose_nothing() {
    let queue = Arc::new(AsyncQueue::new());

    let mut handles = vec![];
    for producer in 0..10u32 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            for item in 0..100u32 {
                queue.push(producer * 100 + item);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut received = vec![];
    while let Some(item) = queue.pull(Some(Duration::from_millis(20))).await {
        received.push(item);
    }
    assert_eq!(received.len(), 1000);

    // Per-producer order is preserved even though producers interleave.
    for producer in 0..10u32 {
        let from_producer: Vec<u32> = received
            .iter()
            .copied()
            .filter(|item| item / 100 == producer)
            .collect();
        let mut sorted = from_producer.clone();
        sorted.sort_unstable();
        assert_eq!(from_producer, sorted);
    }
}

#[tokio::test]
async fn metrics_count_traffic() {
    let queue = AsyncQueue::new();
    queue.push(1);
    queue.push(2);
    let _ = queue.pull(None).await;
    let _ = queue.pull(Some(Duration::from_millis(10))).await;
    let _ = queue.pull(Some(Duration::from_millis(10))).await;

    let metrics = queue.metrics();
    assert_eq!(metrics.pushed, 2);
    assert_eq!(metrics.pulled, 2);
    assert_eq!(metrics.timeouts, 1);
    assert_eq!(metrics.depth, 0);
}
