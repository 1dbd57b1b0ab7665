use std::collections::HashMap;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::time::delay_queue;
use tokio_util::time::DelayQueue;
use tracing::debug;

use super::QueueKey;
use super::WorkQueue;

/// Longest delay `add_after` honours; longer delays are shortened to it.
///
/// Stays well inside the range of the timer wheel behind the queue.
pub const MAX_REQUEUE_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Work queue that can add keys after a delay.
///
/// A key already waiting for its deadline is not duplicated; a second
/// `add_after` only ever moves the deadline earlier. Creating one spawns the
/// timer task, so it must happen inside a Tokio runtime.
pub struct DelayingQueue<K> {
    queue: WorkQueue<K>,
    waiting_tx: mpsc::UnboundedSender<(K, Instant)>,
    stop: CancellationToken,
}

impl<K> Clone for DelayingQueue<K> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            waiting_tx: self.waiting_tx.clone(),
            stop: self.stop.clone(),
        }
    }
}

impl<K: QueueKey> DelayingQueue<K> {
    pub fn new(name: impl Into<String>) -> Self {
        let queue = WorkQueue::new(name);
        let (waiting_tx, waiting_rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();
        tokio::spawn(waiting_loop(queue.clone(), waiting_rx, stop.clone()));
        Self {
            queue,
            waiting_tx,
            stop,
        }
    }

    /// Adds `item` once `delay` has elapsed; a zero delay adds it now.
    ///
    /// Delays above [`MAX_REQUEUE_DELAY`] are capped.
    pub fn add_after(
        &self,
        item: K,
        delay: Duration,
    ) {
        if self.queue.shutting_down() {
            return;
        }
        let delay = delay.min(MAX_REQUEUE_DELAY);
        if delay.is_zero() {
            self.queue.add(item);
            return;
        }
        if self.waiting_tx.send((item, Instant::now() + delay)).is_err() {
            debug!(queue = %self.queue.name(), "delay timer stopped, add ignored");
        }
    }

    pub fn add(
        &self,
        item: K,
    ) {
        self.queue.add(item);
    }

    pub async fn get(&self) -> Option<K> {
        self.queue.get().await
    }

    pub fn done(
        &self,
        item: &K,
    ) {
        self.queue.done(item);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn name(&self) -> &str {
        self.queue.name()
    }

    /// Shuts the queue down and discards keys still waiting for a deadline.
    pub fn shut_down(&self) {
        self.stop.cancel();
        self.queue.shut_down();
    }

    pub async fn shut_down_with_drain(&self) {
        self.stop.cancel();
        self.queue.shut_down_with_drain().await;
    }

    pub fn shutting_down(&self) -> bool {
        self.queue.shutting_down()
    }
}

async fn waiting_loop<K: QueueKey>(
    queue: WorkQueue<K>,
    mut waiting_rx: mpsc::UnboundedReceiver<(K, Instant)>,
    stop: CancellationToken,
) {
    let mut timers: DelayQueue<K> = DelayQueue::new();
    let mut waiting: HashMap<K, (delay_queue::Key, Instant)> = HashMap::new();

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            Some(expired) = timers.next(), if !timers.is_empty() => {
                let item = expired.into_inner();
                waiting.remove(&item);
                queue.add(item);
            }
            entry = waiting_rx.recv() => {
                let Some((item, ready_at)) = entry else {
                    break;
                };
                match waiting.get_mut(&item) {
                    Some((timer_key, deadline)) => {
                        if ready_at < *deadline {
                            timers.reset_at(timer_key, ready_at);
                            *deadline = ready_at;
                        }
                    }
                    None => {
                        let timer_key = timers.insert_at(item.clone(), ready_at);
                        waiting.insert(item, (timer_key, ready_at));
                    }
                }
            }
        }
    }
    debug!(queue = %queue.name(), pending = waiting.len(), "delay timer stopped");
}
