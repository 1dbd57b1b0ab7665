use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use super::BackoffPolicy;
use crate::Error;
use crate::Result;

/// List/watch behaviour of the reflector.
///
/// ```toml
/// [reflector]
/// resync_period_ms = 0        # disabled
/// relist_period_ms = 1000
/// jitter = 1.0
///
/// [reflector.list_retry]
/// max_retries = 3
/// timeout_ms = 60000
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ReflectorConfig {
    /// Re-deliver every cached object as an update this often (0 disables)
    #[serde(default)]
    pub resync_period_ms: u64,

    /// Pause before relisting after a failed list or watch
    #[serde(default = "default_relist_period_ms")]
    pub relist_period_ms: u64,

    /// Random extra fraction of `relist_period_ms` added to each pause
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Timeout and retries of a single list call
    #[serde(default)]
    pub list_retry: BackoffPolicy,
}

impl Default for ReflectorConfig {
    fn default() -> Self {
        Self {
            resync_period_ms: 0,
            relist_period_ms: default_relist_period_ms(),
            jitter: default_jitter(),
            list_retry: BackoffPolicy::default(),
        }
    }
}

impl ReflectorConfig {
    pub fn resync_period(&self) -> Option<Duration> {
        (self.resync_period_ms > 0).then(|| Duration::from_millis(self.resync_period_ms))
    }

    pub fn relist_period(&self) -> Duration {
        Duration::from_millis(self.relist_period_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.jitter.is_finite() && self.jitter >= 0.0) {
            return Err(Error::Config(ConfigError::Message(format!(
                "reflector.jitter must be a non-negative number, got {}",
                self.jitter
            ))));
        }
        self.list_retry.validate("reflector.list_retry")
    }
}

fn default_relist_period_ms() -> u64 {
    1000
}

fn default_jitter() -> f64 {
    1.0
}
