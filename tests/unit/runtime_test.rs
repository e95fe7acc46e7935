//! Tests for the tokio scheduler adapter

#![cfg(feature = "tokio-runtime")]

use std::time::Duration;

use prometheus_priority_limiter::builders::build_from_json;
use prometheus_priority_limiter::config::SchedulerConfig;
use prometheus_priority_limiter::core::PriorityScheduler;
use prometheus_priority_limiter::runtime::TokioScheduler;
use prometheus_priority_limiter::{
    CallableTask, ListenableFuture, Priority, SchedulerError, TaskError,
};

fn small_config() -> SchedulerConfig {
    SchedulerConfig {
        worker_threads: 1,
        max_blocking_threads: 4,
        default_priority: Priority::Low,
        thread_name: "pl-unit".into(),
    }
}

#[test]
fn test_submit_returns_value() {
    let scheduler = TokioScheduler::from_config(&small_config()).unwrap();
    assert_eq!(scheduler.default_priority(), Priority::Low);

    let future = scheduler.submit(Box::new(|| 6 * 7), Priority::High).unwrap();
    assert_eq!(future.get_timeout(Duration::from_secs(5)), Ok(42));
    scheduler.shutdown();
}

#[test]
fn test_submit_captures_panic() {
    let scheduler = TokioScheduler::from_config(&small_config()).unwrap();
    let future = scheduler
        .submit(Box::new(|| -> u8 { panic!("bad shard") }), Priority::High)
        .unwrap();
    assert_eq!(
        future.get_timeout(Duration::from_secs(5)),
        Err(TaskError::Panicked("bad shard".into()))
    );
    scheduler.shutdown();
}

#[test]
fn test_shutdown_is_idempotent_and_rejects() {
    let scheduler = TokioScheduler::from_config(&small_config()).unwrap();
    scheduler.shutdown();
    scheduler.shutdown();
    assert!(scheduler.is_shutdown());
    assert_eq!(
        scheduler.execute(Box::new(|| {}), Priority::High),
        Err(SchedulerError::Shutdown)
    );
    assert_eq!(
        scheduler.schedule(Box::new(|| {}), Duration::from_millis(5), Priority::Low),
        Err(SchedulerError::Shutdown)
    );
}

#[test]
fn test_scheduler_on_existing_runtime() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let scheduler = TokioScheduler::new(runtime.handle().clone(), Priority::High);

    let future = scheduler
        .submit(Box::new(|| "from handle"), Priority::Low)
        .unwrap();
    assert_eq!(future.get_timeout(Duration::from_secs(5)), Ok("from handle"));
    assert_eq!(scheduler.queued_job_count(), 0);
    drop(scheduler);
    drop(runtime);
}

#[test]
fn test_build_from_json() {
    let (scheduler, limiters) = build_from_json(
        r#"{
            "scheduler": { "worker_threads": 1, "max_blocking_threads": 4 },
            "limiters": { "embed": { "max_concurrency": 2, "sub_pool_name": "embed" } }
        }"#,
    )
    .unwrap();

    let embed = &limiters["embed"];
    let value = embed
        .submit_callable(CallableTask::new(|| 5_u16), None)
        .unwrap()
        .get_timeout(Duration::from_secs(5));
    assert_eq!(value, Ok(5));
    scheduler.shutdown();
}

#[test]
fn test_build_from_json_reports_context() {
    let err = build_from_json(r#"{ "limiters": {} }"#).unwrap_err();
    assert_eq!(err.to_string(), "loading limiter set configuration");
}
