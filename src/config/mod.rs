//! Configuration models for limiters and the bundled scheduler.

pub mod limiter;

pub use limiter::{LimiterConfig, LimiterSetConfig, SchedulerConfig};
