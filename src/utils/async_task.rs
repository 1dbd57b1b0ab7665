use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Result;
use crate::SystemError;

/// Runs `task` until it succeeds, bounding each attempt by `policy.timeout_ms`
/// and doubling the pause between attempts up to `policy.max_delay_ms`.
///
/// `policy.max_retries == 0` retries forever. When attempts run out the error
/// of the last attempt is returned.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
) -> Result<P>
where
    F: Fn() -> T,
    T: Future<Output = Result<P>>,
{
    let timeout_duration = policy.timeout();
    let max_delay = policy.max_delay();
    let mut current_delay = policy.base_delay();
    let mut attempt = 0usize;

    loop {
        attempt += 1;
        let last_error = match timeout(timeout_duration, task()).await {
            Ok(Ok(r)) => return Ok(r),
            Ok(Err(error)) => {
                warn!(?error, attempt, "task failed");
                error
            }
            Err(_) => {
                warn!(?timeout_duration, attempt, "task timed out");
                SystemError::TaskTimeout(timeout_duration).into()
            }
        };

        if policy.max_retries != 0 && attempt >= policy.max_retries {
            warn!("task failed after {} attempts", attempt);
            return Err(last_error);
        }

        debug!("retrying in {:?}...", current_delay);
        sleep(current_delay).await;
        current_delay = (current_delay * 2).min(max_delay);
    }
}

/// Adds a random extra of up to `factor * period` to `period`.
///
/// A non-positive factor leaves the period unchanged.
pub(crate) fn jittered(
    period: Duration,
    factor: f64,
) -> Duration {
    if factor <= 0.0 || period.is_zero() {
        return period;
    }
    let extra = rand::thread_rng().gen_range(0.0..=factor);
    period + period.mul_f64(extra)
}

// Helper function to spawn tasks and track their JoinHandles
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
