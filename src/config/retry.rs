use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::MAX_REQUEUE_DELAY;

/// Slowest overall requeue rate accepted: one key every ~17 minutes.
pub const MIN_QPS: f64 = 0.001;

/// Basic retry policy template
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of attempts (0 means unlimited retries)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Single operation timeout (unit: milliseconds)
    #[serde(default = "default_op_timeout_ms")]
    pub timeout_ms: u64,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_op_timeout_ms(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(
        &self,
        name: &str,
    ) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "{name}.timeout_ms must be greater than 0"
            ))));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "{name}.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }
        Ok(())
    }
}

fn default_max_retries() -> usize {
    3
}
fn default_op_timeout_ms() -> u64 {
    60_000
}
fn default_base_delay_ms() -> u64 {
    800
}
fn default_max_delay_ms() -> u64 {
    30_000
}

/// Work queue rate limiting: per-key exponential backoff combined with an
/// overall token bucket. The effective delay of a requeue is the larger of
/// the two.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct RateLimitPolicy {
    /// First per-key retry delay (unit: milliseconds)
    #[serde(default = "default_item_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-key retry delay cap (unit: milliseconds)
    #[serde(default = "default_item_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Overall requeue rate across all keys
    #[serde(default = "default_qps")]
    pub qps: f64,

    /// Requeues allowed in a burst before `qps` applies
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: default_item_base_delay_ms(),
            max_delay_ms: default_item_max_delay_ms(),
            qps: default_qps(),
            burst: default_burst(),
        }
    }
}

impl RateLimitPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "rate_limit.base_delay_ms ({}) exceeds max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }
        if self.max_delay() > MAX_REQUEUE_DELAY {
            return Err(Error::Config(ConfigError::Message(format!(
                "rate_limit.max_delay_ms ({}) exceeds the {}ms limit",
                self.max_delay_ms,
                MAX_REQUEUE_DELAY.as_millis()
            ))));
        }
        if !(self.qps.is_finite() && self.qps >= MIN_QPS) {
            return Err(Error::Config(ConfigError::Message(format!(
                "rate_limit.qps must be at least {MIN_QPS}, got {}",
                self.qps
            ))));
        }
        if self.burst == 0 {
            return Err(Error::Config(ConfigError::Message(
                "rate_limit.burst must be at least 1".into(),
            )));
        }
        Ok(())
    }
}

fn default_item_base_delay_ms() -> u64 {
    5
}
fn default_item_max_delay_ms() -> u64 {
    1_000_000
}
fn default_qps() -> f64 {
    10.0
}
fn default_burst() -> u32 {
    100
}
