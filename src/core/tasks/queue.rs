//! core::tasks::queue
//!
//! Per-key mutual exclusion for async operations.
//!
//! # Architecture
//!
//! A [`SerialQueue`] runs at most one operation per key at a time. Keys are
//! opaque strings; operations under different keys run fully in parallel.
//! Within one key, operations start in submission order (FIFO).
//!
//! The store uses three well-known keys:
//!
//! - [`COMMIT`] - stage, commit, push and HEAD refresh
//! - [`CAT_FILE`] - every request against the batch helper
//! - [`LOG`] - history queries
//!
//! # Invariants
//!
//! - A key with no running or pending operation has no map entry
//! - Completion (success, failure, or cancellation) hands the key to the
//!   next waiter by waking it, never by running it inline
//! - One operation failing does not affect any other
//!
//! # Example
//!
//! ```
//! use gitfolio::core::tasks::queue::SerialQueue;
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let queue = SerialQueue::new();
//!     let a = queue.enqueue("commit", async { 1 });
//!     let b = queue.enqueue("commit", async { 2 });
//!     assert_eq!(a.await + b.await, 3);
//!     assert_eq!(queue.active_keys(), 0);
//! });
//! ```

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

/// Queue key serializing repository writes.
pub const COMMIT: &str = "commit";
/// Queue key serializing batch helper requests.
pub const CAT_FILE: &str = "cat-file";
/// Queue key serializing history queries.
pub const LOG: &str = "log";

#[derive(Default)]
struct Lane {
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// A per-key FIFO scheduler.
///
/// Cloning is cheap; clones share the same lanes.
#[derive(Clone, Default)]
pub struct SerialQueue {
    lanes: Arc<Mutex<HashMap<String, Lane>>>,
}

impl std::fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialQueue")
            .field("active_keys", &self.active_keys())
            .finish()
    }
}

impl SerialQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `op` under `key`.
    ///
    /// The position in the key's FIFO is taken when this method is called,
    /// not when the returned future is first polled. The operation itself
    /// only starts once every earlier operation for the key has finished.
    pub fn enqueue<F, T>(&self, key: &str, op: F) -> impl Future<Output = T> + Send + 'static
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut slot = Slot {
            rx: self.register(key),
            granted: false,
            queue: self.clone(),
            key: key.to_string(),
        };
        if slot.rx.is_none() {
            slot.granted = true;
        }

        async move {
            slot.wait().await;
            op.await
        }
    }

    /// Number of keys with a running or pending operation.
    pub fn active_keys(&self) -> usize {
        self.lock().len()
    }

    /// Number of operations waiting (not running) under `key`.
    pub fn pending(&self, key: &str) -> usize {
        self.lock().get(key).map(|lane| lane.waiters.len()).unwrap_or(0)
    }

    /// Claim a slot for `key`. Returns `None` when the caller may run now.
    fn register(&self, key: &str) -> Option<oneshot::Receiver<()>> {
        let mut lanes = self.lock();
        match lanes.get_mut(key) {
            Some(lane) => {
                let (tx, rx) = oneshot::channel();
                lane.waiters.push_back(tx);
                Some(rx)
            }
            None => {
                lanes.insert(key.to_string(), Lane::default());
                None
            }
        }
    }

    /// Hand `key` to the next live waiter, or retire the lane.
    fn release(&self, key: &str) {
        let mut lanes = self.lock();
        let Some(lane) = lanes.get_mut(key) else {
            return;
        };

        while let Some(next) = lane.waiters.pop_front() {
            // A dropped receiver means the waiter was cancelled.
            if next.send(()).is_ok() {
                return;
            }
        }

        lanes.remove(key);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Lane>> {
        // Lane bookkeeping cannot be left half-updated, so a poisoned lock
        // still holds consistent data.
        self.lanes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One caller's place in a lane.
///
/// Dropping a granted slot passes the key on. Dropping a slot that is still
/// queued closes its channel; if the grant raced the drop, the key is passed
/// on as well.
struct Slot {
    rx: Option<oneshot::Receiver<()>>,
    granted: bool,
    queue: SerialQueue,
    key: String,
}

impl Slot {
    async fn wait(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            // The sender is only dropped when the lane is retired, which
            // cannot happen while this slot is still queued on it.
            let _ = rx.await;
            self.rx = None;
            self.granted = true;
        }
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.granted {
            self.queue.release(&self.key);
        } else if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.queue.release(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_runs_in_submission_order() {
        let queue = SerialQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5u64 {
            let log = log.clone();
            // Later submissions sleep less, so without serialization they
            // would finish first.
            let fut = queue.enqueue("k", async move {
                tokio::time::sleep(Duration::from_millis(25 - i * 5)).await;
                log.lock().unwrap().push(i);
            });
            handles.push(tokio::spawn(fut));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.active_keys(), 0);
    }

    #[tokio::test]
    async fn at_most_one_in_flight_per_key() {
        let queue = SerialQueue::new();
        let running = Arc::new(Mutex::new(0usize));
        let peak = Arc::new(Mutex::new(0usize));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(queue.enqueue("k", async move {
                {
                    let mut r = running.lock().unwrap();
                    *r += 1;
                    let mut p = peak.lock().unwrap();
                    *p = (*p).max(*r);
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
                *running.lock().unwrap() -= 1;
            })));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*peak.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn different_keys_run_in_parallel() {
        let queue = SerialQueue::new();
        let (tx, rx) = oneshot::channel::<()>();

        // "a" blocks until "b" signals it; this deadlocks if keys share a lane.
        let a = tokio::spawn(queue.enqueue("a", async move {
            rx.await.unwrap();
            "a"
        }));
        let b = tokio::spawn(queue.enqueue("b", async move {
            tx.send(()).unwrap();
            "b"
        }));

        let (a, b) = tokio::time::timeout(Duration::from_secs(5), async {
            (a.await.unwrap(), b.await.unwrap())
        })
        .await
        .expect("keys should not block each other");
        assert_eq!((a, b), ("a", "b"));
    }

    #[tokio::test]
    async fn failure_does_not_poison_key() {
        let queue = SerialQueue::new();

        let first = queue.enqueue("k", async { Err::<u32, &str>("boom") });
        let second = queue.enqueue("k", async { Ok::<u32, &str>(7) });

        assert_eq!(first.await, Err("boom"));
        assert_eq!(second.await, Ok(7));
        assert_eq!(queue.active_keys(), 0);
    }

    #[tokio::test]
    async fn cancelled_waiter_is_skipped() {
        let queue = SerialQueue::new();
        let (tx, rx) = oneshot::channel::<()>();

        let holder = tokio::spawn(queue.enqueue("k", async move {
            rx.await.ok();
        }));
        let ran = Arc::new(Mutex::new(false));
        let flag = ran.clone();
        let cancelled = queue.enqueue("k", async move {
            *flag.lock().unwrap() = true;
        });
        let third = queue.enqueue("k", async { 3 });
        assert_eq!(queue.pending("k"), 2);

        drop(cancelled);
        tx.send(()).unwrap();
        holder.await.unwrap();

        assert_eq!(third.await, 3);
        assert!(!*ran.lock().unwrap());
        assert_eq!(queue.active_keys(), 0);
    }

    #[tokio::test]
    async fn granted_but_unpolled_slot_passes_key_on() {
        let queue = SerialQueue::new();

        let first = queue.enqueue("k", async {});
        let second = queue.enqueue("k", async {});
        let third = queue.enqueue("k", async { 3 });

        // Finishing `first` grants `second`, which is dropped without ever
        // being polled.
        first.await;
        drop(second);

        assert_eq!(third.await, 3);
        assert_eq!(queue.active_keys(), 0);
    }

    #[tokio::test]
    async fn idle_keys_are_removed() {
        let queue = SerialQueue::new();
        for i in 0..10 {
            queue.enqueue(&format!("key-{i}"), async {}).await;
        }
        assert_eq!(queue.active_keys(), 0);
    }
}
