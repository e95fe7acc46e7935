//! Tests for configuration validation

use prometheus_priority_limiter::config::limiter::{ENV_MAX_CONCURRENCY, ENV_SUB_POOL_NAME};
use prometheus_priority_limiter::config::{LimiterConfig, LimiterSetConfig, SchedulerConfig};
use prometheus_priority_limiter::Priority;

#[test]
fn test_limiter_config_validation() {
    assert!(LimiterConfig::new(4).validate().is_ok());
    assert!(LimiterConfig::new(0).validate().is_err());
    assert!(LimiterConfig::new(2)
        .with_sub_pool_name("embeddings")
        .validate()
        .is_ok());
}

#[test]
fn test_scheduler_config_validation() {
    assert!(SchedulerConfig::default().validate().is_ok());

    let invalid = SchedulerConfig {
        worker_threads: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());

    let unnamed = SchedulerConfig {
        thread_name: String::new(),
        ..SchedulerConfig::default()
    };
    assert!(unnamed.validate().is_err());
}

#[test]
fn test_limiter_set_from_json() {
    let cfg = LimiterSetConfig::from_json_str(
        r#"{
            "scheduler": { "worker_threads": 2, "default_priority": "low" },
            "limiters": {
                "ingest": { "max_concurrency": 1 },
                "search": { "max_concurrency": 4, "sub_pool_name": "search" }
            }
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.scheduler.worker_threads, 2);
    assert_eq!(cfg.scheduler.default_priority, Priority::Low);
    assert_eq!(cfg.scheduler.max_blocking_threads, 64);
    assert_eq!(cfg.limiters["ingest"], LimiterConfig::new(1));
    assert_eq!(cfg.limiters["search"].sub_pool_name.as_deref(), Some("search"));
}

#[test]
fn test_limiter_set_errors_name_the_failing_limiter() {
    let err = LimiterSetConfig::from_json_str(
        r#"{ "limiters": { "broken": { "max_concurrency": 0 } } }"#,
    )
    .unwrap_err();
    assert!(err.starts_with("limiter `broken` invalid"), "{err}");

    let err = LimiterSetConfig::from_json_str(r#"{ "limiters": {} }"#).unwrap_err();
    assert_eq!(err, "at least one limiter must be defined");

    let err = LimiterSetConfig::from_json_str("not json").unwrap_err();
    assert!(err.starts_with("parse error"), "{err}");
}

// The only test in this binary touching these variables.
#[test]
fn test_limiter_config_from_env() {
    std::env::set_var(ENV_MAX_CONCURRENCY, " 3 ");
    std::env::set_var(ENV_SUB_POOL_NAME, "reports");
    let cfg = LimiterConfig::from_env().unwrap();
    assert_eq!(cfg, LimiterConfig::new(3).with_sub_pool_name("reports"));

    std::env::set_var(ENV_MAX_CONCURRENCY, "many");
    assert!(LimiterConfig::from_env().is_err());

    std::env::remove_var(ENV_MAX_CONCURRENCY);
    std::env::remove_var(ENV_SUB_POOL_NAME);
    assert!(LimiterConfig::from_env().is_err());
}
