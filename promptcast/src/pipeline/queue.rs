//! Work queues connecting pipeline stages.
//!
//! A [`WorkQueue`] is a FIFO channel with completion tracking. Besides moving
//! items from producers to consumers it counts how many items are still
//! unfinished, so a caller can [`join`](WorkQueue::join) the queue and wait
//! until every item ever put has been acknowledged.
//!
//! # Backpressure
//!
//! Bounded queues suspend `put` while full. Sizing a bounded queue to its
//! worker pool caps how many requests can be outstanding against the remote
//! service behind that pool. The terminal store queue is unbounded so that
//! persistence never blocks generation or upscaling.
//!
//! # Acknowledgement
//!
//! Every item comes out of [`get`](WorkQueue::get) paired with a
//! [`TaskGuard`]. Calling [`TaskGuard::done`] acknowledges the item; dropping
//! the guard acknowledges it as well. An item can therefore never be
//! acknowledged twice through its guard, and an early return or panic in a
//! worker cannot leave the queue waiting forever.
//!
//! # Shutdown
//!
//! Each queue owns a child of the run's shutdown token. Cancelling the parent
//! or calling [`close`](WorkQueue::close) wakes every blocked `put`, `get` and
//! `join`.
//!
//! ```ignore
//! let queue = WorkQueue::bounded("descriptions", 5, &shutdown);
//!
//! queue.put(GenerationRequest::new("cat, in space")).await?;
//!
//! while let Some((request, guard)) = queue.get().await {
//!     handle(request).await;
//!     guard.done();
//! }
//! ```

use super::error::QueueError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Put/acknowledge totals for one queue.
///
/// After a clean run `put == acknowledged` for every queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub put: u64,
    pub acknowledged: u64,
}

impl QueueCounts {
    /// Items put but not yet acknowledged.
    pub fn outstanding(&self) -> u64 {
        self.put.saturating_sub(self.acknowledged)
    }
}

/// Completion bookkeeping shared between a queue and its guards.
#[derive(Debug)]
struct Tracker {
    label: String,
    unfinished: watch::Sender<usize>,
    put: AtomicU64,
    acknowledged: AtomicU64,
}

impl Tracker {
    fn new(label: String) -> Self {
        let (unfinished, _) = watch::channel(0);
        Self {
            label,
            unfinished,
            put: AtomicU64::new(0),
            acknowledged: AtomicU64::new(0),
        }
    }

    /// Registers an item before it becomes visible to consumers.
    fn enqueued(&self) {
        self.put.fetch_add(1, Ordering::Relaxed);
        self.unfinished.send_modify(|n| *n += 1);
    }

    /// Undoes [`enqueued`](Self::enqueued) for an item that never made it in.
    fn rollback(&self) {
        self.put.fetch_sub(1, Ordering::Relaxed);
        self.unfinished.send_modify(|n| *n = n.saturating_sub(1));
    }

    fn complete(&self) -> Result<(), QueueError> {
        let decremented = self.unfinished.send_if_modified(|n| {
            if *n == 0 {
                false
            } else {
                *n -= 1;
                true
            }
        });

        if decremented {
            self.acknowledged.fetch_add(1, Ordering::Relaxed);
            Ok(())
        } else {
            Err(QueueError::TooManyAcknowledgements {
                label: self.label.clone(),
            })
        }
    }

    fn unfinished(&self) -> usize {
        *self.unfinished.borrow()
    }

    fn counts(&self) -> QueueCounts {
        QueueCounts {
            put: self.put.load(Ordering::Relaxed),
            acknowledged: self.acknowledged.load(Ordering::Relaxed),
        }
    }
}

enum QueueSender<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

enum QueueReceiver<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

impl<T> QueueReceiver<T> {
    async fn recv(&mut self) -> Option<T> {
        match self {
            QueueReceiver::Bounded(rx) => rx.recv().await,
            QueueReceiver::Unbounded(rx) => rx.recv().await,
        }
    }
}

/// FIFO queue with put/get/task_done/join semantics.
///
/// Shared between producers and consumers through `Arc`. Consumers contend
/// for a single receiver, so items are handed out strictly in order.
pub struct WorkQueue<T> {
    capacity: Option<usize>,
    sender: QueueSender<T>,
    receiver: Mutex<QueueReceiver<T>>,
    tracker: Arc<Tracker>,
    shutdown: CancellationToken,
}

impl<T: Send> WorkQueue<T> {
    /// Creates a queue holding at most `capacity` waiting items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn bounded(label: impl Into<String>, capacity: usize, shutdown: &CancellationToken) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");

        let (tx, rx) = mpsc::channel(capacity);
        Self {
            capacity: Some(capacity),
            sender: QueueSender::Bounded(tx),
            receiver: Mutex::new(QueueReceiver::Bounded(rx)),
            tracker: Arc::new(Tracker::new(label.into())),
            shutdown: shutdown.child_token(),
        }
    }

    /// Creates a queue that never blocks producers.
    pub fn unbounded(label: impl Into<String>, shutdown: &CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            capacity: None,
            sender: QueueSender::Unbounded(tx),
            receiver: Mutex::new(QueueReceiver::Unbounded(rx)),
            tracker: Arc::new(Tracker::new(label.into())),
            shutdown: shutdown.child_token(),
        }
    }

    /// Adds an item, waiting for space if the queue is bounded and full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Shutdown`] if the queue is closed before the
    /// item could be added. The item is dropped in that case.
    pub async fn put(&self, item: T) -> Result<(), QueueError> {
        if self.shutdown.is_cancelled() {
            return Err(QueueError::Shutdown);
        }

        match &self.sender {
            QueueSender::Bounded(tx) => {
                let permit = tokio::select! {
                    biased;
                    _ = self.shutdown.cancelled() => return Err(QueueError::Shutdown),
                    permit = tx.reserve() => permit.map_err(|_| QueueError::Shutdown)?,
                };
                // Count before sending so a fast consumer can never
                // acknowledge an item the tracker has not seen yet.
                self.tracker.enqueued();
                permit.send(item);
            }
            QueueSender::Unbounded(tx) => {
                self.tracker.enqueued();
                if tx.send(item).is_err() {
                    self.tracker.rollback();
                    return Err(QueueError::Shutdown);
                }
            }
        }

        Ok(())
    }

    /// Removes the next item, waiting while the queue is empty.
    ///
    /// Returns `None` once the queue is closed or the run shuts down. Items
    /// still waiting at that point are never delivered.
    pub async fn get(&self) -> Option<(T, TaskGuard)> {
        let mut receiver = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return None,
            guard = self.receiver.lock() => guard,
        };

        let item = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return None,
            item = receiver.recv() => item?,
        };

        Some((item, TaskGuard::new(Arc::clone(&self.tracker))))
    }

    /// Acknowledges one previously retrieved item.
    ///
    /// Only needed when an item's [`TaskGuard`] was disarmed with
    /// [`TaskGuard::forget`].
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::TooManyAcknowledgements`] if every put item has
    /// already been acknowledged.
    pub fn task_done(&self) -> Result<(), QueueError> {
        self.tracker.complete()
    }

    /// Waits until every item put so far has been acknowledged.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Shutdown`] if the queue is closed first.
    pub async fn join(&self) -> Result<(), QueueError> {
        let mut unfinished = self.tracker.unfinished.subscribe();

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(QueueError::Shutdown),
            result = unfinished.wait_for(|n| *n == 0) => {
                result.map(|_| ()).map_err(|_| QueueError::Shutdown)
            }
        }
    }

    /// Closes the queue, waking every blocked caller.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Returns true once the queue has been closed or the run shut down.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Returns the queue label.
    pub fn label(&self) -> &str {
        &self.tracker.label
    }

    /// Maximum number of waiting items, or `None` for unbounded queues.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Items put but not yet acknowledged.
    pub fn unfinished(&self) -> usize {
        self.tracker.unfinished()
    }

    /// Put/acknowledge totals so far.
    pub fn counts(&self) -> QueueCounts {
        self.tracker.counts()
    }
}

/// Acknowledgement handle for one retrieved item.
///
/// The item is acknowledged exactly once: either by [`done`](Self::done) or
/// when the guard is dropped.
#[must_use = "dropping the guard acknowledges the item immediately"]
pub struct TaskGuard {
    tracker: Option<Arc<Tracker>>,
}

impl TaskGuard {
    fn new(tracker: Arc<Tracker>) -> Self {
        Self {
            tracker: Some(tracker),
        }
    }

    /// Acknowledges the item.
    pub fn done(mut self) {
        self.acknowledge();
    }

    /// Disarms the guard without acknowledging.
    ///
    /// The caller becomes responsible for calling
    /// [`WorkQueue::task_done`] exactly once.
    pub fn forget(mut self) {
        self.tracker = None;
    }

    fn acknowledge(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            if let Err(e) = tracker.complete() {
                warn!(error = %e, "Acknowledgement rejected");
            }
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.acknowledge();
    }
}
