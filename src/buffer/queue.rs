use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::timeout;

/// Counters for lock-free observation of queue traffic.
#[derive(Debug, Clone)]
pub struct QueueMetrics {
    pub pushed: u64,
    pub pulled: u64,
    pub timeouts: u64,
    pub depth: i64,
}

/// FIFO handoff queue between any number of producers and one consumer loop.
///
/// `push` never blocks: the item goes to the longest-waiting `pull`, or is
/// buffered if none is waiting. `pull` suspends until an item arrives or the
/// optional timeout elapses; a timed-out pull leaves the queue exactly as if
/// it had never happened. Items are delivered in push order regardless of
/// how pushes and pulls interleave.
pub struct AsyncQueue<T> {
    inner: Mutex<Inner<T>>,
    pushed: AtomicU64,
    pulled: AtomicU64,
    timeouts: AtomicU64,
}

struct Inner<T> {
    items: VecDeque<T>,
    waiters: VecDeque<Waiter<T>>,
    next_waiter_id: u64,
}

struct Waiter<T> {
    id: u64,
    tx: oneshot::Sender<T>,
}

impl<T: Send> AsyncQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                waiters: VecDeque::new(),
                next_waiter_id: 0,
            }),
            pushed: AtomicU64::new(0),
            pulled: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
        }
    }

    /// Hands `item` to the longest-waiting pull, or buffers it.
    pub fn push(&self, item: T) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock();
        let mut item = item;
        while let Some(waiter) = inner.waiters.pop_front() {
            match waiter.tx.send(item) {
                Ok(()) => return,
                // Waiter timed out between registering and now; try the next.
                Err(rejected) => item = rejected,
            }
        }
        inner.items.push_back(item);
    }

    /// Waits for the next item. With `wait == None` this suspends until an
    /// item is pushed; otherwise it returns `None` once the timeout elapses.
    pub async fn pull(&self, wait: Option<Duration>) -> Option<T> {
        let (id, mut rx) = {
            let mut inner = self.inner.lock();
            if let Some(item) = inner.items.pop_front() {
                self.pulled.fetch_add(1, Ordering::Relaxed);
                return Some(item);
            }
            let (tx, rx) = oneshot::channel();
            let id = inner.next_waiter_id;
            inner.next_waiter_id += 1;
            inner.waiters.push_back(Waiter { id, tx });
            (id, rx)
        };

        let delivered = match wait {
            None => rx.await.ok(),
            Some(limit) => match timeout(limit, &mut rx).await {
                Ok(result) => result.ok(),
                Err(_) => {
                    // Deregister, then drain a delivery that raced the
                    // timeout: push holds the lock while sending, so after
                    // close() no further send can land.
                    {
                        let mut inner = self.inner.lock();
                        inner.waiters.retain(|w| w.id != id);
                        rx.close();
                    }
                    rx.try_recv().ok()
                }
            },
        };

        match delivered {
            Some(item) => {
                self.pulled.fetch_add(1, Ordering::Relaxed);
                Some(item)
            }
            None => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Buffered-but-unclaimed items minus unsatisfied pull waiters; negative
    /// while pulls are parked ahead of pushes.
    pub fn len(&self) -> i64 {
        let inner = self.inner.lock();
        inner.items.len() as i64 - inner.waiters.len() as i64
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0
    }

    pub fn metrics(&self) -> QueueMetrics {
        QueueMetrics {
            pushed: self.pushed.load(Ordering::Relaxed),
            pulled: self.pulled.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            depth: self.len(),
        }
    }
}

impl<T: Send> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for AsyncQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AsyncQueue")
            .field("buffered", &inner.items.len())
            .field("waiters", &inner.waiters.len())
            .field("pushed", &self.pushed.load(Ordering::Relaxed))
            .field("pulled", &self.pulled.load(Ordering::Relaxed))
            .finish()
    }
}
