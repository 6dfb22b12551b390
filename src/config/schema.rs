use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Upper bound on `max_replans_per_plan`; anything larger defeats the guard.
pub const MAX_REPLANS_CEILING: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path the config was loaded from - not serialized
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
    /// Dependency-driven concurrent batches. `false` runs one ready step at a
    /// time, in plan order.
    #[serde(default = "default_enable_rewoo")]
    pub enable_rewoo: bool,
    /// In-run retries for a step whose action returns an error.
    #[serde(default)]
    pub max_retries: u32,
    /// Replans allowed per plan lineage before the engine stops asking.
    #[serde(default = "default_max_replans_per_plan")]
    pub max_replans_per_plan: u32,
    /// Ready steps started per batch. `0` means no cap.
    #[serde(default)]
    pub max_parallel_steps: usize,
    /// Per-attempt invoker timeout in seconds. `0` disables it.
    #[serde(default)]
    pub step_timeout_secs: u64,
    /// Base delay (ms) for exponential backoff between retries.
    #[serde(default)]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_enable_rewoo() -> bool {
    true
}

fn default_max_replans_per_plan() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            enable_rewoo: default_enable_rewoo(),
            max_retries: 0,
            max_replans_per_plan: default_max_replans_per_plan(),
            max_parallel_steps: 0,
            step_timeout_secs: 0,
            retry_backoff_ms: 0,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "log_level must be one of [{}], got '{}'",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }
        if self.max_replans_per_plan > MAX_REPLANS_CEILING {
            return Err(ConfigError::Validation(format!(
                "max_replans_per_plan must be <= {MAX_REPLANS_CEILING}, got {}",
                self.max_replans_per_plan
            )));
        }
        Ok(())
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        (self.step_timeout_secs > 0).then(|| Duration::from_secs(self.step_timeout_secs))
    }

    /// Backoff before retry number `retries_used + 1`, capped at 30 s.
    pub fn retry_backoff(&self, retries_used: u32) -> Duration {
        if self.retry_backoff_ms == 0 {
            return Duration::ZERO;
        }
        let shift = retries_used.min(20);
        let backoff_ms = self
            .retry_backoff_ms
            .saturating_mul(1_u64 << shift)
            .min(30_000);
        Duration::from_millis(backoff_ms)
    }

    /// How many ready steps one batch may start.
    pub fn batch_limit(&self) -> usize {
        if !self.enable_rewoo {
            1
        } else if self.max_parallel_steps == 0 {
            usize::MAX
        } else {
            self.max_parallel_steps
        }
    }
}
