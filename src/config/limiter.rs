//! Limiter and scheduler configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::util::serde::Priority;

/// Environment variable holding a limiter's concurrency ceiling.
pub const ENV_MAX_CONCURRENCY: &str = "PL_LIMITER_MAX_CONCURRENCY";
/// Environment variable holding a limiter's sub-pool name.
pub const ENV_SUB_POOL_NAME: &str = "PL_LIMITER_SUB_POOL_NAME";

/// Configuration of one limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Maximum tasks running at once through the limiter.
    pub max_concurrency: usize,
    /// Name shown on scheduler threads while they run this limiter's tasks.
    #[serde(default)]
    pub sub_pool_name: Option<String>,
}

impl LimiterConfig {
    /// Config with the given ceiling and no sub-pool name.
    #[must_use]
    pub const fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency,
            sub_pool_name: None,
        }
    }

    /// Set the sub-pool name.
    #[must_use]
    pub fn with_sub_pool_name(mut self, name: impl Into<String>) -> Self {
        self.sub_pool_name = Some(name.into());
        self
    }

    /// Validate limiter configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrency == 0 {
            return Err("max_concurrency must be greater than 0".into());
        }
        if self.sub_pool_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err("sub_pool_name must not be blank".into());
        }
        Ok(())
    }

    /// Read the config from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        let raw = std::env::var(ENV_MAX_CONCURRENCY)
            .map_err(|_| format!("{ENV_MAX_CONCURRENCY} is not set"))?;
        let max_concurrency = raw
            .trim()
            .parse()
            .map_err(|e| format!("{ENV_MAX_CONCURRENCY}=`{raw}` is not a count: {e}"))?;
        let cfg = Self {
            max_concurrency,
            sub_pool_name: std::env::var(ENV_SUB_POOL_NAME).ok(),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

const fn default_max_blocking_threads() -> usize {
    64
}

const fn default_priority() -> Priority {
    Priority::High
}

fn default_thread_name() -> String {
    "pl-scheduler".into()
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

/// Configuration of the bundled tokio-backed scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Async worker threads driving timers.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
    /// Upper bound on threads running jobs.
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,
    /// Priority used when a submission does not pick one.
    #[serde(default = "default_priority")]
    pub default_priority: Priority,
    /// Name prefix of the runtime's threads.
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            max_blocking_threads: default_max_blocking_threads(),
            default_priority: default_priority(),
            thread_name: default_thread_name(),
        }
    }
}

impl SchedulerConfig {
    /// Validate scheduler configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_threads == 0 {
            return Err("worker_threads must be greater than 0".into());
        }
        if self.max_blocking_threads == 0 {
            return Err("max_blocking_threads must be greater than 0".into());
        }
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty".into());
        }
        Ok(())
    }
}

/// A scheduler plus the named limiters sharing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSetConfig {
    /// Shared scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Map of limiter name to configuration.
    pub limiters: HashMap<String, LimiterConfig>,
}

impl LimiterSetConfig {
    /// Validate the scheduler and every limiter; at least one limiter is required.
    pub fn validate(&self) -> Result<(), String> {
        self.scheduler
            .validate()
            .map_err(|e| format!("scheduler invalid: {e}"))?;
        if self.limiters.is_empty() {
            return Err("at least one limiter must be defined".into());
        }
        for (name, limiter) in &self.limiters {
            limiter
                .validate()
                .map_err(|e| format!("limiter `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
