use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use super::QueueKey;
use crate::metrics::WORKQUEUE_ADDS;
use crate::metrics::WORKQUEUE_DEPTH;

struct QueueState<K> {
    /// Keys waiting to be handed out, in order
    queue: VecDeque<K>,
    /// Keys that need processing; superset of `queue`
    dirty: HashSet<K>,
    /// Keys currently held by a worker
    processing: HashSet<K>,
    shutting_down: bool,
}

struct Inner<K> {
    name: String,
    state: Mutex<QueueState<K>>,
    item_ready: Notify,
    drained: Notify,
}

/// FIFO work queue with set semantics.
///
/// - A key added while it is already waiting is coalesced into one entry.
/// - A key added while a worker holds it is parked and re-queued by
///   [`WorkQueue::done`], so one key is never processed concurrently.
///
/// Cloning yields another handle to the same queue.
pub struct WorkQueue<K> {
    inner: Arc<Inner<K>>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K: QueueKey> WorkQueue<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(QueueState {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                item_ready: Notify::new(),
                drained: Notify::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Marks `item` as needing processing. Ignored after shutdown.
    pub fn add(
        &self,
        item: K,
    ) {
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            debug!(queue = %self.inner.name, ?item, "queue is shutting down, add ignored");
            return;
        }
        if !state.dirty.insert(item.clone()) {
            trace!(queue = %self.inner.name, ?item, "already pending");
            return;
        }
        WORKQUEUE_ADDS.with_label_values(&[self.inner.name.as_str()]).inc();
        if state.processing.contains(&item) {
            return;
        }
        state.queue.push_back(item);
        self.record_depth(&state);
        drop(state);
        self.inner.item_ready.notify_one();
    }

    /// Waits for the next key and marks it as processing.
    ///
    /// Returns `None` once the queue is shut down and empty. Keys queued
    /// before shutdown are still handed out.
    pub async fn get(&self) -> Option<K> {
        loop {
            // Registered before the check so a concurrent notify_one is not lost
            let notified = self.inner.item_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.inner.state.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    self.record_depth(&state);
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Releases `item`. If it was added again while held, it goes back on
    /// the queue now.
    pub fn done(
        &self,
        item: &K,
    ) {
        let mut state = self.inner.state.lock();
        state.processing.remove(item);
        if state.dirty.contains(item) {
            state.queue.push_back(item.clone());
            self.record_depth(&state);
            drop(state);
            self.inner.item_ready.notify_one();
        } else if state.processing.is_empty() {
            drop(state);
            self.inner.drained.notify_waiters();
        }
    }

    /// Number of keys waiting to be handed out.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting keys and wakes every blocked [`get`](Self::get).
    pub fn shut_down(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.item_ready.notify_waiters();
    }

    /// Like [`shut_down`](Self::shut_down), then waits until no key is held
    /// by a worker.
    pub async fn shut_down_with_drain(&self) {
        self.shut_down();
        loop {
            let drained = self.inner.drained.notified();
            if self.inner.state.lock().processing.is_empty() {
                return;
            }
            drained.await;
        }
    }

    pub fn shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }

    fn record_depth(
        &self,
        state: &QueueState<K>,
    ) {
        WORKQUEUE_DEPTH
            .with_label_values(&[self.inner.name.as_str()])
            .set(state.queue.len() as i64);
    }
}
