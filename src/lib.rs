//! # Prometheus Priority Limiter
//!
//! Bounded-concurrency control in front of a shared priority scheduler.
//!
//! Several subsystems of an AI platform often share one priority-aware worker
//! scheduler. Giving each of them a dedicated thread pool wastes threads; letting
//! them all submit freely lets one subsystem starve the rest. A
//! [`PrioritySchedulerLimiter`] sits between a subsystem and the shared
//! scheduler and guarantees that no more than a configured number of its
//! tasks execute at once, without owning any threads of its own.
//!
//! ## How it works
//!
//! - **Admission**: each task takes a slot from an [`AdmissionCounter`] right
//!   before it is handed to the scheduler, and gives it back when it finishes
//!   (including by panic, or when the scheduler rejects it).
//! - **Parking**: when every slot is taken, tasks wait in a FIFO queue and are
//!   drained onto the scheduler as slots free up.
//! - **Delayed and recurring work** waits in the limiter without a slot and
//!   re-enters admission when its delay elapses, so the ceiling also bounds
//!   scheduled work.
//! - **Deferred futures**: future-bearing submissions return a
//!   [`DeferredFuture`] immediately, even while the task is still queued. It
//!   is bound to the scheduler's real future once the task is admitted.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use prometheus_priority_limiter::builders::LimiterBuilder;
//! use prometheus_priority_limiter::config::SchedulerConfig;
//! use prometheus_priority_limiter::runtime::TokioScheduler;
//! use prometheus_priority_limiter::{ListenableFuture, Task};
//!
//! # fn main() -> anyhow::Result<()> {
//! prometheus_priority_limiter::util::telemetry::init_tracing();
//!
//! let scheduler = TokioScheduler::from_config(&SchedulerConfig::default())?;
//! let embeddings = LimiterBuilder::new(scheduler.clone(), 2)
//!     .sub_pool_name("embeddings")
//!     .build()?;
//!
//! let future = embeddings.submit_with_result(Task::new(|| { /* work */ }), "done", None)?;
//! assert_eq!(future.get()?, "done");
//! # Ok(())
//! # }
//! ```
//!
//! For complete scenarios, see `tests/limiter_test.rs` and
//! `tests/recurring_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Limiter, admission accounting and the scheduler contract.
pub mod core;
/// Configuration models for limiters and the bundled scheduler.
pub mod config;
/// Builders to construct limiters from code or configuration.
pub mod builders;
/// Listenable and deferred futures.
pub mod future;
/// Single-assignment binding primitive.
pub mod once;
/// Scheduler adapters for concrete runtimes.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{
    AdmissionCounter, CallableTask, LimiterError, PriorityScheduler, PrioritySchedulerLimiter,
    SchedulerError, Task, TaskError,
};
pub use crate::future::{DeferredFuture, ListenableFuture, SettableFuture};
pub use crate::once::BindCell;
pub use crate::util::serde::Priority;
