//! Limiter builder and configuration-driven construction.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{LimiterConfig, LimiterSetConfig};
use crate::core::{LimiterError, PriorityScheduler, PrioritySchedulerLimiter};
use crate::util::exception::ExceptionHandler;

/// Step-by-step construction of a [`PrioritySchedulerLimiter`].
pub struct LimiterBuilder<S: PriorityScheduler> {
    scheduler: S,
    max_concurrency: usize,
    sub_pool_name: Option<String>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
}

impl<S: PriorityScheduler> LimiterBuilder<S> {
    /// Start a builder for a limiter over `scheduler`.
    pub const fn new(scheduler: S, max_concurrency: usize) -> Self {
        Self {
            scheduler,
            max_concurrency,
            sub_pool_name: None,
            exception_handler: None,
        }
    }

    /// Start a builder from a [`LimiterConfig`]; `build` validates it.
    pub fn from_config(scheduler: S, cfg: &LimiterConfig) -> Self {
        Self {
            sub_pool_name: cfg.sub_pool_name.clone(),
            ..Self::new(scheduler, cfg.max_concurrency)
        }
    }

    /// Annotate scheduler threads with `name` while they run this limiter's tasks.
    #[must_use]
    pub fn sub_pool_name(mut self, name: impl Into<String>) -> Self {
        self.sub_pool_name = Some(name.into());
        self
    }

    /// Route panics from fire-and-forget and recurring tasks to `handler`
    /// instead of the process-wide handler.
    #[must_use]
    pub fn exception_handler(mut self, handler: Arc<dyn ExceptionHandler>) -> Self {
        self.exception_handler = Some(handler);
        self
    }

    /// Build the limiter.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::InvalidConcurrency` for a zero ceiling and
    /// `LimiterError::InvalidConfig` for a blank sub-pool name.
    pub fn build(self) -> Result<PrioritySchedulerLimiter<S>, LimiterError> {
        if self.sub_pool_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(LimiterError::InvalidConfig(
                "sub_pool_name must not be blank".into(),
            ));
        }
        PrioritySchedulerLimiter::with_options(
            self.scheduler,
            self.max_concurrency,
            self.sub_pool_name,
            self.exception_handler,
        )
    }
}

/// Build every limiter of `cfg` over clones of one shared `scheduler`.
///
/// # Errors
///
/// Returns `LimiterError::InvalidConfig` when `cfg` fails validation.
pub fn build_limiters<S>(
    cfg: &LimiterSetConfig,
    scheduler: &S,
) -> Result<HashMap<String, PrioritySchedulerLimiter<S>>, LimiterError>
where
    S: PriorityScheduler + Clone,
{
    cfg.validate().map_err(LimiterError::InvalidConfig)?;

    let mut limiters = HashMap::new();
    for (name, limiter_cfg) in &cfg.limiters {
        let limiter = LimiterBuilder::from_config(scheduler.clone(), limiter_cfg).build()?;
        limiters.insert(name.clone(), limiter);
    }
    Ok(limiters)
}

/// Parse a JSON limiter set, start its tokio scheduler and build the limiters.
///
/// # Errors
///
/// Fails when the JSON is invalid, the runtime cannot start, or a limiter
/// cannot be built.
#[cfg(feature = "tokio-runtime")]
pub fn build_from_json(
    input: &str,
) -> crate::core::AppResult<(
    crate::runtime::TokioScheduler,
    HashMap<String, PrioritySchedulerLimiter<crate::runtime::TokioScheduler>>,
)> {
    use anyhow::Context;

    let cfg = LimiterSetConfig::from_json_str(input)
        .map_err(anyhow::Error::msg)
        .context("loading limiter set configuration")?;
    let scheduler = crate::runtime::TokioScheduler::from_config(&cfg.scheduler)
        .context("starting tokio scheduler runtime")?;
    let limiters = build_limiters(&cfg, &scheduler).context("building limiters")?;
    Ok((scheduler, limiters))
}
