//! Core limiter, admission accounting and the scheduler contract.

pub mod admission;
pub mod error;
pub mod limiter;
mod recurring;
pub mod scheduler;
pub mod task;
mod wrapper;

pub use admission::AdmissionCounter;
pub use error::{AppResult, LimiterError, SchedulerError, TaskError};
pub use limiter::PrioritySchedulerLimiter;
pub use scheduler::{Executor, Job, PriorityScheduler};
pub use task::{Callable, CallableTask, Identifiable, Runnable, Task, TaskIdentity, TaskResult};
