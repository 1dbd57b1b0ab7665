use std::time::Duration;

use tokio::time::sleep;

use super::*;
use crate::RateLimitPolicy;

#[tokio::test(start_paused = true)]
async fn test_add_rate_limited_backs_off_per_key() {
    let q = RateLimitingQueue::with_policy("test-rl", &RateLimitPolicy::default());

    q.add_rate_limited("a");
    assert_eq!(q.num_requeues(&"a"), 1);
    assert_eq!(q.len(), 0);

    assert_eq!(q.get().await, Some("a"));
    q.done(&"a");

    q.add_rate_limited("a");
    assert_eq!(q.num_requeues(&"a"), 2);
    sleep(Duration::from_millis(6)).await;
    assert_eq!(q.len(), 0, "second retry waits 10ms");
    sleep(Duration::from_millis(8)).await;
    assert_eq!(q.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_forget_resets_history_without_dequeuing() {
    let q = RateLimitingQueue::with_policy("test-rl-forget", &RateLimitPolicy::default());
    q.add("a");
    q.add_rate_limited("a");

    q.forget(&"a");

    assert_eq!(q.num_requeues(&"a"), 0);
    assert_eq!(q.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clones_share_one_queue() {
    let q = RateLimitingQueue::with_policy("test-rl-clone", &RateLimitPolicy::default());
    let other = q.clone();

    other.add("a");
    other.add_after("b", Duration::from_millis(10));

    assert_eq!(q.get().await, Some("a"));
    assert_eq!(q.get().await, Some("b"));
    q.shut_down();
    assert!(other.shutting_down());
}

#[tokio::test(start_paused = true)]
async fn test_custom_rate_limiter_is_used() {
    let q = RateLimitingQueue::new(
        "test-rl-custom",
        ItemExponentialFailureRateLimiter::new(Duration::from_secs(1), Duration::from_secs(1)),
    );

    q.add_rate_limited(7u32);
    sleep(Duration::from_millis(900)).await;
    assert!(q.is_empty());
    sleep(Duration::from_millis(200)).await;
    assert_eq!(q.get().await, Some(7));
}

#[tokio::test(start_paused = true)]
async fn test_oversized_backoff_does_not_stall_other_keys() {
    let century = Duration::from_secs(100 * 365 * 24 * 60 * 60);
    let q = RateLimitingQueue::new(
        "test-rl-oversized",
        ItemExponentialFailureRateLimiter::new(century, century),
    );

    q.add_rate_limited("a");
    q.add_after("b", Duration::from_millis(10));
    sleep(Duration::from_millis(20)).await;

    assert_eq!(q.len(), 1);
    assert_eq!(q.get().await, Some("b"));
    q.done(&"b");

    q.add_rate_limited("b");
    assert_eq!(q.num_requeues(&"b"), 1);
}
