//! Listenable futures returned by schedulers and limiters.
//!
//! - [`SettableFuture`] is completed by whoever runs the job; scheduler
//!   adapters return it from `submit`.
//! - [`DeferredFuture`] is handed to a caller before the real future exists
//!   and is bound to it exactly once, when the limiter admits the task.

pub mod deferred;
pub mod settable;

use std::sync::Arc;
use std::time::Duration;

use crate::core::{Executor, Job, TaskError};

pub use deferred::DeferredFuture;
pub use settable::SettableFuture;

/// Callback invoked once a future completes.
pub type Listener = Job;

/// Shared handle to a scheduler-produced future.
pub type FutureHandle<T> = Arc<dyn ListenableFuture<T>>;

/// A blocking future that accepts completion listeners.
pub trait ListenableFuture<T>: Send + Sync {
    /// Run `listener` once the future is done, on `executor` if given,
    /// otherwise on the completing thread (or inline if already done).
    fn add_listener(&self, listener: Listener, executor: Option<Arc<dyn Executor>>);

    /// Block until done and return the outcome.
    ///
    /// # Errors
    ///
    /// Returns the task's failure, or `TaskError::Cancelled`.
    fn get(&self) -> Result<T, TaskError>;

    /// Like [`get`](Self::get) but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `TaskError::Timeout` if the outcome is not ready in time.
    fn get_timeout(&self, timeout: Duration) -> Result<T, TaskError>;

    /// Whether an outcome is available.
    fn is_done(&self) -> bool;

    /// Attempt to cancel; `true` if this call moved the future to cancelled.
    fn cancel(&self) -> bool;

    /// Whether the future was cancelled.
    fn is_cancelled(&self) -> bool;
}

/// Run a listener inline or on its executor, containing panics.
pub(crate) fn dispatch_listener(listener: Listener, executor: Option<Arc<dyn Executor>>) {
    match executor {
        Some(executor) => executor.execute_job(listener),
        None => {
            if let Err(payload) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(listener)) {
                crate::util::exception::handle_uncaught(None, payload);
            }
        }
    }
}
