//! Caller-facing task handles.
//!
//! Tasks are shared behind an `Arc` so a caller can keep a clone of what it
//! submitted and later pass it to
//! [`PrioritySchedulerLimiter::remove`](crate::core::PrioritySchedulerLimiter::remove).
//! Identity is the address of that shared allocation.

use std::fmt;
use std::sync::Arc;

/// A unit of work that can run any number of times.
pub trait Runnable: Send + Sync + 'static {
    /// Run the task body.
    fn run(&self);
}

impl<F> Runnable for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn run(&self) {
        self();
    }
}

/// A unit of work that produces a value.
pub trait Callable<T>: Send + Sync + 'static {
    /// Run the task body and return its value.
    fn call(&self) -> T;
}

impl<F, T> Callable<T> for F
where
    F: Fn() -> T + Send + Sync + 'static,
{
    fn call(&self) -> T {
        self()
    }
}

/// Values that can travel through a task future.
pub trait TaskResult: Clone + Send + 'static {}

impl<T> TaskResult for T where T: Clone + Send + 'static {}

/// Pointer identity of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskIdentity(usize);

impl TaskIdentity {
    fn of<Q: ?Sized>(shared: &Arc<Q>) -> Self {
        Self(Arc::as_ptr(shared).cast::<()>() as usize)
    }
}

/// Anything that can be matched against queued work.
pub trait Identifiable {
    /// Identity used to find this task among queued wrappers.
    fn identity(&self) -> TaskIdentity;
}

/// Shared handle to a [`Runnable`].
#[derive(Clone)]
pub struct Task {
    inner: Arc<dyn Runnable>,
}

impl Task {
    /// Wrap a runnable (usually a closure).
    pub fn new<R: Runnable>(runnable: R) -> Self {
        Self {
            inner: Arc::new(runnable),
        }
    }

    /// Wrap an already shared runnable without reallocating.
    #[must_use]
    pub fn from_arc(inner: Arc<dyn Runnable>) -> Self {
        Self { inner }
    }

    /// Run the task body on the current thread.
    pub fn run(&self) {
        self.inner.run();
    }
}

impl Identifiable for Task {
    fn identity(&self) -> TaskIdentity {
        TaskIdentity::of(&self.inner)
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.identity()).finish()
    }
}

/// Shared handle to a [`Callable`].
pub struct CallableTask<T> {
    inner: Arc<dyn Callable<T>>,
}

impl<T: 'static> CallableTask<T> {
    /// Wrap a callable (usually a closure).
    pub fn new<C: Callable<T>>(callable: C) -> Self {
        Self {
            inner: Arc::new(callable),
        }
    }

    /// Run the task body on the current thread.
    pub fn call(&self) -> T {
        self.inner.call()
    }
}

impl<T> Clone for CallableTask<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Identifiable for CallableTask<T> {
    fn identity(&self) -> TaskIdentity {
        TaskIdentity::of(&self.inner)
    }
}

impl<T> fmt::Debug for CallableTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallableTask").field(&self.identity()).finish()
    }
}
