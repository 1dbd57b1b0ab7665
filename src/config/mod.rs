//! Configuration management module for the reconciliation core.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Environment variable overrides
//! - Configuration file support
//! - Component-wise validation
mod controller;
mod monitoring;
mod reflector;
mod retry;
pub use controller::*;
pub use monitoring::*;
pub use reflector::*;
pub use retry::*;


use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Prefix of environment variables overriding configuration, e.g.
/// `CTRL__CONTROLLER__WORKERS=4`.
pub const ENV_PREFIX: &str = "CTRL";

/// Main configuration container for the control loop components
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ControllerSettings {
    /// Worker pool and retry ceiling
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Per-key backoff and overall bucket limits of the work queue
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
    /// List/watch, relist and resync behaviour
    #[serde(default)]
    pub reflector: ReflectorConfig,
    /// Metrics exposition
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl ControllerSettings {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `CTRL__` prefix (highest priority)
    ///
    /// # Note
    /// This method does NOT validate the configuration. Callers MUST call `validate()`
    /// before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CTRL__CONTROLLER__WORKERS", "4");
    /// let cfg = ControllerSettings::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns the first subsystem validation failure.
    pub fn validate(self) -> Result<Self> {
        self.controller.validate()?;
        self.rate_limit.validate()?;
        self.reflector.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
