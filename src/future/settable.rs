//! Condvar-backed future completed by the thread that runs the job.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::core::{Executor, TaskError, TaskResult};
use crate::future::{dispatch_listener, ListenableFuture, Listener};
use crate::util::exception::panic_message;

/// Outcome state of a future.
#[derive(Debug)]
enum Outcome<T> {
    /// Waiting for the job.
    Pending,
    /// Job produced a value.
    Ready(T),
    /// Job failed.
    Failed(TaskError),
    /// Cancelled before the job finished.
    Cancelled,
}

struct FutureState<T> {
    outcome: Outcome<T>,
    listeners: Vec<(Listener, Option<Arc<dyn Executor>>)>,
}

/// A future completed explicitly through [`set_result`](Self::set_result),
/// [`set_failure`](Self::set_failure) or [`complete_with`](Self::complete_with).
///
/// Waiters block on a condition variable; listeners run exactly once, after
/// the state lock is released.
pub struct SettableFuture<T> {
    state: Mutex<FutureState<T>>,
    done: Condvar,
}

impl<T> Default for SettableFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SettableFuture<T> {
    /// Creates a pending future.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(FutureState {
                outcome: Outcome::Pending,
                listeners: Vec::new(),
            }),
            done: Condvar::new(),
        }
    }

    /// A future already holding `value`.
    pub fn completed(value: T) -> Self {
        let future = Self::new();
        future.finish(Outcome::Ready(value));
        future
    }

    /// A future already failed with `error`.
    pub fn failed(error: TaskError) -> Self {
        let future = Self::new();
        future.finish(Outcome::Failed(error));
        future
    }

    /// A future that is already cancelled.
    pub fn cancelled() -> Self {
        let future = Self::new();
        future.finish(Outcome::Cancelled);
        future
    }

    /// Complete with a value; `false` if already done.
    pub fn set_result(&self, value: T) -> bool {
        self.finish(Outcome::Ready(value))
    }

    /// Complete with a failure; `false` if already done.
    pub fn set_failure(&self, error: TaskError) -> bool {
        self.finish(Outcome::Failed(error))
    }

    /// Run `job` on the current thread and complete with its outcome.
    ///
    /// A panic is captured as `TaskError::Panicked`. Returns `false` if the
    /// future was already done (for example cancelled) by the time `job`
    /// returned.
    pub fn complete_with<F>(&self, job: F) -> bool
    where
        F: FnOnce() -> T,
    {
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(value) => self.set_result(value),
            Err(payload) => self.set_failure(TaskError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    fn finish(&self, outcome: Outcome<T>) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            if !matches!(state.outcome, Outcome::Pending) {
                return false;
            }
            state.outcome = outcome;
            std::mem::take(&mut state.listeners)
        };
        self.done.notify_all();
        for (listener, executor) in listeners {
            dispatch_listener(listener, executor);
        }
        true
    }
}

impl<T: Clone> SettableFuture<T> {
    fn read(outcome: &Outcome<T>) -> Option<Result<T, TaskError>> {
        match outcome {
            Outcome::Pending => None,
            Outcome::Ready(value) => Some(Ok(value.clone())),
            Outcome::Failed(error) => Some(Err(error.clone())),
            Outcome::Cancelled => Some(Err(TaskError::Cancelled)),
        }
    }
}

impl<T: TaskResult> ListenableFuture<T> for SettableFuture<T> {
    fn add_listener(&self, listener: Listener, executor: Option<Arc<dyn Executor>>) {
        {
            let mut state = self.state.lock();
            if matches!(state.outcome, Outcome::Pending) {
                state.listeners.push((listener, executor));
                return;
            }
        }
        dispatch_listener(listener, executor);
    }

    fn get(&self) -> Result<T, TaskError> {
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = Self::read(&state.outcome) {
                return outcome;
            }
            self.done.wait(&mut state);
        }
    }

    fn get_timeout(&self, timeout: Duration) -> Result<T, TaskError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = Self::read(&state.outcome) {
                return outcome;
            }
            if self.done.wait_until(&mut state, deadline).timed_out() {
                return Self::read(&state.outcome).unwrap_or(Err(TaskError::Timeout));
            }
        }
    }

    fn is_done(&self) -> bool {
        !matches!(self.state.lock().outcome, Outcome::Pending)
    }

    fn cancel(&self) -> bool {
        self.finish(Outcome::Cancelled)
    }

    fn is_cancelled(&self) -> bool {
        matches!(self.state.lock().outcome, Outcome::Cancelled)
    }
}
