use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::QueueKey;
use super::MAX_REQUEUE_DELAY;
use crate::RateLimitPolicy;

/// Decides how long a key waits before it is requeued.
pub trait RateLimiter<K>: Send + Sync + 'static {
    /// Delay for the next requeue of `item`; records one more failure.
    fn when(
        &self,
        item: &K,
    ) -> Duration;

    /// Clears the failure history of `item`.
    fn forget(
        &self,
        item: &K,
    );

    /// Failures recorded for `item` since it was last forgotten.
    fn num_requeues(
        &self,
        item: &K,
    ) -> usize;
}

/// Per-key exponential backoff: `base * 2^failures`, capped at `max`.
pub struct ItemExponentialFailureRateLimiter<K: QueueKey> {
    failures: DashMap<K, u32>,
    base_delay: Duration,
    max_delay: Duration,
}

impl<K: QueueKey> ItemExponentialFailureRateLimiter<K> {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            failures: DashMap::new(),
            base_delay,
            max_delay,
        }
    }
}

impl<K: QueueKey> RateLimiter<K> for ItemExponentialFailureRateLimiter<K> {
    fn when(
        &self,
        item: &K,
    ) -> Duration {
        let exp = {
            let mut failures = self.failures.entry(item.clone()).or_insert(0);
            let exp = *failures;
            *failures = failures.saturating_add(1);
            exp
        };

        // f64 so large exponents saturate instead of overflowing
        let backoff = self.base_delay.as_secs_f64() * 2f64.powi(exp.min(i32::MAX as u32) as i32);
        if !backoff.is_finite() || backoff > self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(backoff).unwrap_or(self.max_delay)
    }

    fn forget(
        &self,
        item: &K,
    ) {
        self.failures.remove(item);
    }

    fn num_requeues(
        &self,
        item: &K,
    ) -> usize {
        self.failures.get(item).map(|n| *n as usize).unwrap_or(0)
    }
}

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Overall token bucket shared by every key: `burst` immediate requeues,
/// then `qps` per second. Keeps no per-key history.
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl BucketRateLimiter {
    pub fn new(
        qps: f64,
        burst: u32,
    ) -> Self {
        Self {
            qps,
            burst: burst as f64,
            bucket: Mutex::new(Bucket {
                tokens: burst as f64,
                last: Instant::now(),
            }),
        }
    }
}

impl<K: QueueKey> RateLimiter<K> for BucketRateLimiter {
    fn when(
        &self,
        _item: &K,
    ) -> Duration {
        let mut bucket = self.bucket.lock();
        let now = Instant::now();
        let refill = now.saturating_duration_since(bucket.last).as_secs_f64() * self.qps;
        bucket.tokens = (bucket.tokens + refill).min(self.burst);
        bucket.last = now;

        // Tokens may go negative: later callers queue up behind earlier ones.
        bucket.tokens -= 1.0;
        if bucket.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(-bucket.tokens / self.qps)
                .map_or(MAX_REQUEUE_DELAY, |delay| delay.min(MAX_REQUEUE_DELAY))
        }
    }

    fn forget(
        &self,
        _item: &K,
    ) {
    }

    fn num_requeues(
        &self,
        _item: &K,
    ) -> usize {
        0
    }
}

/// Combines limiters by taking the longest delay and the highest requeue
/// count.
pub struct MaxOfRateLimiter<K> {
    limiters: Vec<Arc<dyn RateLimiter<K>>>,
}

impl<K: QueueKey> MaxOfRateLimiter<K> {
    pub fn new(limiters: Vec<Arc<dyn RateLimiter<K>>>) -> Self {
        Self { limiters }
    }
}

impl<K: QueueKey> RateLimiter<K> for MaxOfRateLimiter<K> {
    fn when(
        &self,
        item: &K,
    ) -> Duration {
        self.limiters.iter().map(|l| l.when(item)).max().unwrap_or(Duration::ZERO)
    }

    fn forget(
        &self,
        item: &K,
    ) {
        for limiter in &self.limiters {
            limiter.forget(item);
        }
    }

    fn num_requeues(
        &self,
        item: &K,
    ) -> usize {
        self.limiters.iter().map(|l| l.num_requeues(item)).max().unwrap_or(0)
    }
}

/// Per-key exponential backoff combined with an overall token bucket.
pub fn default_controller_rate_limiter<K: QueueKey>(policy: &RateLimitPolicy) -> MaxOfRateLimiter<K> {
    let per_item: Arc<dyn RateLimiter<K>> = Arc::new(ItemExponentialFailureRateLimiter::new(
        policy.base_delay(),
        policy.max_delay(),
    ));
    let overall: Arc<dyn RateLimiter<K>> = Arc::new(BucketRateLimiter::new(policy.qps, policy.burst));
    MaxOfRateLimiter::new(vec![per_item, overall])
}
