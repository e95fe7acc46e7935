//! Tests for limiter builders

use std::sync::Arc;
use std::time::Duration;

use prometheus_priority_limiter::builders::{build_limiters, LimiterBuilder};
use prometheus_priority_limiter::config::{LimiterConfig, LimiterSetConfig};
use prometheus_priority_limiter::core::{Job, PriorityScheduler, SchedulerError, TaskResult};
use prometheus_priority_limiter::future::{FutureHandle, SettableFuture};
use prometheus_priority_limiter::util::thread_name::current_thread_name;
use prometheus_priority_limiter::{CallableTask, LimiterError, ListenableFuture, Priority};

/// Runs every job on the submitting thread.
#[derive(Clone, Copy, Default)]
struct InlineScheduler;

impl PriorityScheduler for InlineScheduler {
    fn default_priority(&self) -> Priority {
        Priority::High
    }

    fn execute(&self, job: Job, _priority: Priority) -> Result<(), SchedulerError> {
        job();
        Ok(())
    }

    fn submit<T: TaskResult>(
        &self,
        job: Box<dyn FnOnce() -> T + Send + 'static>,
        _priority: Priority,
    ) -> Result<FutureHandle<T>, SchedulerError> {
        let future = Arc::new(SettableFuture::new());
        future.complete_with(job);
        Ok(future as FutureHandle<T>)
    }

    fn schedule(&self, job: Job, _delay: Duration, _priority: Priority) -> Result<(), SchedulerError> {
        job();
        Ok(())
    }

    fn active_task_count(&self) -> usize {
        0
    }

    fn is_shutdown(&self) -> bool {
        false
    }
}

#[test]
fn test_builder_defaults() {
    let limiter = LimiterBuilder::new(InlineScheduler, 3).build().unwrap();
    assert_eq!(limiter.max_concurrency(), 3);
    assert_eq!(limiter.sub_pool_name(), None);
    assert_eq!(limiter.default_priority(), Priority::High);
}

#[test]
fn test_builder_rejects_invalid_settings() {
    assert!(matches!(
        LimiterBuilder::new(InlineScheduler, 0).build(),
        Err(LimiterError::InvalidConcurrency)
    ));
    assert!(matches!(
        LimiterBuilder::new(InlineScheduler, 1).sub_pool_name("  ").build(),
        Err(LimiterError::InvalidConfig(_))
    ));
}

#[test]
fn test_sub_pool_name_applies_while_task_runs() {
    let limiter = LimiterBuilder::from_config(
        InlineScheduler,
        &LimiterConfig::new(1).with_sub_pool_name("rerank"),
    )
    .build()
    .unwrap();
    let outside = current_thread_name();

    let inside = limiter
        .submit_callable(CallableTask::new(current_thread_name), None)
        .unwrap()
        .get()
        .unwrap();

    assert_eq!(inside, format!("rerank[{outside}]"));
    assert_eq!(current_thread_name(), outside);
}

#[test]
fn test_build_limiters_shares_scheduler() {
    let cfg = LimiterSetConfig::from_json_str(
        r#"{ "limiters": {
            "ingest": { "max_concurrency": 1 },
            "search": { "max_concurrency": 4, "sub_pool_name": "search" }
        } }"#,
    )
    .unwrap();

    let limiters = build_limiters(&cfg, &InlineScheduler).unwrap();
    assert_eq!(limiters.len(), 2);
    assert_eq!(limiters["ingest"].max_concurrency(), 1);
    assert_eq!(limiters["search"].sub_pool_name(), Some("search"));
}

#[test]
fn test_build_limiters_validates_config() {
    let mut cfg = LimiterSetConfig::from_json_str(
        r#"{ "limiters": { "ingest": { "max_concurrency": 1 } } }"#,
    )
    .unwrap();
    cfg.limiters.insert("empty".into(), LimiterConfig::new(0));

    assert!(matches!(
        build_limiters(&cfg, &InlineScheduler),
        Err(LimiterError::InvalidConfig(_))
    ));
}
