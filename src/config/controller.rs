use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Worker pool and retry settings of a controller.
///
/// ```toml
/// [controller]
/// name = "pod"
/// workers = 2
/// retry_ceiling = 5
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ControllerConfig {
    /// Name used in logs, metrics and the work queue label
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of concurrent workers draining the queue
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Failed attempts tolerated before a key is dropped.
    ///
    /// A key is requeued while its requeue count is below this value, so a
    /// ceiling of 5 allows six reconcile attempts in total. 0 drops on the
    /// first failure.
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            workers: default_workers(),
            retry_ceiling: default_retry_ceiling(),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "controller.name cannot be empty".into(),
            )));
        }
        if self.workers == 0 {
            return Err(Error::Config(ConfigError::Message(
                "controller.workers must be at least 1".into(),
            )));
        }
        Ok(())
    }
}

fn default_name() -> String {
    "controller".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_retry_ceiling() -> usize {
    5
}
