use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use super::default_controller_rate_limiter;
use super::DelayingQueue;
use super::QueueKey;
use super::RateLimiter;
use crate::metrics::WORKQUEUE_RETRIES;
use crate::RateLimitPolicy;

/// Delaying queue whose requeue delays come from a [`RateLimiter`].
///
/// This is the queue controllers hand to their event handler and workers.
pub struct RateLimitingQueue<K> {
    queue: DelayingQueue<K>,
    rate_limiter: Arc<dyn RateLimiter<K>>,
}

impl<K> Clone for RateLimitingQueue<K> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

impl<K: QueueKey> RateLimitingQueue<K> {
    pub fn new(
        name: impl Into<String>,
        rate_limiter: impl RateLimiter<K>,
    ) -> Self {
        Self {
            queue: DelayingQueue::new(name),
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    /// Queue using [`default_controller_rate_limiter`].
    pub fn with_policy(
        name: impl Into<String>,
        policy: &RateLimitPolicy,
    ) -> Self {
        Self::new(name, default_controller_rate_limiter(policy))
    }

    pub fn add(
        &self,
        item: K,
    ) {
        self.queue.add(item);
    }

    pub fn add_after(
        &self,
        item: K,
        delay: Duration,
    ) {
        self.queue.add_after(item, delay);
    }

    /// Requeues `item` once the rate limiter allows it.
    pub fn add_rate_limited(
        &self,
        item: K,
    ) {
        let delay = self.rate_limiter.when(&item);
        trace!(queue = %self.queue.name(), ?item, ?delay, "rate limited requeue");
        WORKQUEUE_RETRIES.with_label_values(&[self.queue.name()]).inc();
        self.queue.add_after(item, delay);
    }

    /// Clears the retry history of `item`. Does not remove it from the queue.
    pub fn forget(
        &self,
        item: &K,
    ) {
        self.rate_limiter.forget(item);
    }

    pub fn num_requeues(
        &self,
        item: &K,
    ) -> usize {
        self.rate_limiter.num_requeues(item)
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

    pub fn shut_down(&self) {
        self.queue.shut_down();
    }

    pub async fn shut_down_with_drain(&self) {
        self.queue.shut_down_with_drain().await;
    }

    pub fn shutting_down(&self) -> bool {
        self.queue.shutting_down()
    }
}
