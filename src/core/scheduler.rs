//! Contract of the underlying priority scheduler.

use std::sync::Arc;
use std::time::Duration;

use crate::core::{SchedulerError, TaskResult};
use crate::future::FutureHandle;
use crate::util::serde::Priority;

/// A one-shot job handed to a scheduler or executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Anything that can run a one-shot job, such as a future listener.
pub trait Executor: Send + Sync {
    /// Run `job` at the executor's discretion.
    fn execute_job(&self, job: Job);
}

/// The priority-aware scheduler a limiter bounds.
///
/// Implementations own the worker threads and delay timer. A job that is
/// rejected with an error is dropped without running. Futures returned from
/// [`submit`](Self::submit) must capture a panicking job as
/// [`TaskError::Panicked`](crate::core::TaskError::Panicked).
pub trait PriorityScheduler: Send + Sync + 'static {
    /// Priority used when a caller does not pick one.
    fn default_priority(&self) -> Priority;

    /// Run `job` as soon as a worker is free.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler does not accept work.
    fn execute(&self, job: Job, priority: Priority) -> Result<(), SchedulerError>;

    /// Run `job` and expose its value through a future.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler does not accept work.
    fn submit<T: TaskResult>(
        &self,
        job: Box<dyn FnOnce() -> T + Send + 'static>,
        priority: Priority,
    ) -> Result<FutureHandle<T>, SchedulerError>;

    /// Run `job` once `delay` has elapsed.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler does not accept work.
    fn schedule(&self, job: Job, delay: Duration, priority: Priority) -> Result<(), SchedulerError>;

    /// Jobs currently executing on the scheduler's workers.
    fn active_task_count(&self) -> usize;

    /// Whether the scheduler stopped accepting work.
    fn is_shutdown(&self) -> bool;
}

impl<S: PriorityScheduler> PriorityScheduler for Arc<S> {
    fn default_priority(&self) -> Priority {
        (**self).default_priority()
    }

    fn execute(&self, job: Job, priority: Priority) -> Result<(), SchedulerError> {
        (**self).execute(job, priority)
    }

    fn submit<T: TaskResult>(
        &self,
        job: Box<dyn FnOnce() -> T + Send + 'static>,
        priority: Priority,
    ) -> Result<FutureHandle<T>, SchedulerError> {
        (**self).submit(job, priority)
    }

    fn schedule(&self, job: Job, delay: Duration, priority: Priority) -> Result<(), SchedulerError> {
        (**self).schedule(job, delay, priority)
    }

    fn active_task_count(&self) -> usize {
        (**self).active_task_count()
    }

    fn is_shutdown(&self) -> bool {
        (**self).is_shutdown()
    }
}
