//! Tests for error types

use prometheus_priority_limiter::core::AppResult;
use prometheus_priority_limiter::{LimiterError, SchedulerError, TaskError};

#[test]
fn test_limiter_error_display() {
    assert_eq!(
        LimiterError::InvalidConcurrency.to_string(),
        "max concurrency must be greater than 0"
    );
    assert_eq!(
        LimiterError::InvalidConfig("sub_pool_name must not be blank".into()).to_string(),
        "invalid configuration: sub_pool_name must not be blank"
    );
}

#[test]
fn test_scheduler_error_converts_into_limiter_error() {
    let err: LimiterError = SchedulerError::Shutdown.into();
    assert!(matches!(err, LimiterError::Scheduler(SchedulerError::Shutdown)));
    assert_eq!(err.to_string(), "scheduler rejected task: scheduler is shut down");
}

#[test]
fn test_task_error_display() {
    assert_eq!(TaskError::Cancelled.to_string(), "task was cancelled");
    assert_eq!(
        TaskError::Panicked("boom".into()).to_string(),
        "task panicked: boom"
    );
    assert_eq!(
        TaskError::Rejected(SchedulerError::Backend("queue full".into()).to_string()).to_string(),
        "task rejected: backend error: queue full"
    );
}

#[test]
fn test_app_result_wraps_limiter_errors() {
    fn build() -> AppResult<()> {
        Err(LimiterError::InvalidConcurrency)?;
        Ok(())
    }
    let err = build().unwrap_err();
    assert!(err.downcast_ref::<LimiterError>().is_some());
}
