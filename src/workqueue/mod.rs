//! Deduplicating, rate-limited work queue.
//!
//! Layers, innermost first:
//! - [`WorkQueue`]: FIFO with a dirty set and a processing set, so a key is
//!   never queued twice and never handed to two workers at once
//! - [`DelayingQueue`]: adds keys once a deadline passes
//! - [`RateLimitingQueue`]: picks the deadline from a [`RateLimiter`]
mod delaying_queue;
mod queue;
mod rate_limiter;
mod rate_limiting_queue;

pub use delaying_queue::*;
pub use queue::*;
pub use rate_limiter::*;
pub use rate_limiting_queue::*;

#[cfg(test)]
mod rate_limiting_queue_test;

use std::fmt::Debug;
use std::hash::Hash;

/// Anything usable as a queue item.
pub trait QueueKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> QueueKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}
