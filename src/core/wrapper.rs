//! One queueable representation for every submission shape.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::core::limiter::{LimiterInner, SlotGuard};
use crate::core::recurring::{self, RecurringTask};
use crate::core::{
    Identifiable, PriorityScheduler, SchedulerError, Task, TaskError, TaskIdentity, TaskResult,
};
use crate::future::{DeferredFuture, FutureHandle, SettableFuture};
use crate::util::exception::handle_uncaught;
use crate::util::serde::{Priority, TaskId};
use crate::util::thread_name::ThreadNameGuard;

/// A future-bearing body whose result type is erased behind the wrapper.
pub(crate) trait PendingSubmit<S: PriorityScheduler>: Send {
    /// Hand the body to the scheduler and bind the caller's future.
    fn dispatch(
        self: Box<Self>,
        inner: &LimiterInner<S>,
        priority: Priority,
        slot: SlotGuard<S>,
    ) -> Result<(), SchedulerError>;

    /// Resolve the caller's future without running the body.
    fn abandon(self: Box<Self>, error: TaskError);
}

struct FutureSubmit<T> {
    body: Box<dyn FnOnce() -> T + Send + 'static>,
    deferred: DeferredFuture<T>,
}

fn bind_future<T: TaskResult>(deferred: &DeferredFuture<T>, real: FutureHandle<T>) {
    let bound = deferred.bind(real);
    debug_assert!(bound, "deferred future bound twice");
    if !bound {
        tracing::error!("deferred future was already bound; keeping the first binding");
    }
}

/// Bind on dispatch; held listeners are forwarded once the drain is over.
fn bind_dispatched<S: PriorityScheduler, T: TaskResult>(
    inner: &LimiterInner<S>,
    deferred: &DeferredFuture<T>,
    real: FutureHandle<T>,
) {
    let forward = deferred.bind_detached(real);
    debug_assert!(forward.is_some(), "deferred future bound twice");
    match forward {
        Some(forward) => inner.defer_forward(forward),
        None => tracing::error!("deferred future was already bound; keeping the first binding"),
    }
}

impl<S: PriorityScheduler, T: TaskResult> PendingSubmit<S> for FutureSubmit<T> {
    fn dispatch(
        self: Box<Self>,
        inner: &LimiterInner<S>,
        priority: Priority,
        slot: SlotGuard<S>,
    ) -> Result<(), SchedulerError> {
        let Self { body, deferred } = *self;
        let name = inner.sub_pool_name().map(str::to_owned);
        let job = Box::new(move || {
            let _name = ThreadNameGuard::enter(name.as_deref());
            let _slot = slot;
            body()
        });
        match inner.scheduler().submit::<T>(job, priority) {
            Ok(real) => {
                bind_dispatched(inner, &deferred, real);
                Ok(())
            }
            Err(err) => {
                let rejected = SettableFuture::failed(TaskError::Rejected(err.to_string()));
                bind_dispatched(inner, &deferred, Arc::new(rejected));
                Err(err)
            }
        }
    }

    fn abandon(self: Box<Self>, error: TaskError) {
        let outcome = match error {
            TaskError::Cancelled => SettableFuture::cancelled(),
            other => SettableFuture::failed(other),
        };
        bind_future(&self.deferred, Arc::new(outcome));
    }
}

/// Variant-specific payload of a [`TaskWrapper`].
pub(crate) enum WrapperKind<S: PriorityScheduler> {
    /// Fire-and-forget runnable.
    Runnable(Task),
    /// Runnable completing its future with a preset value.
    RunnableWithResult(Box<dyn PendingSubmit<S>>),
    /// Callable completing its future with the returned value.
    Callable(Box<dyn PendingSubmit<S>>),
    /// One cycle of a fixed-delay recurring task.
    Recurring(Arc<RecurringTask>),
}

/// A submission waiting for, or holding, an admission slot.
pub(crate) struct TaskWrapper<S: PriorityScheduler> {
    pub(crate) id: TaskId,
    pub(crate) identity: TaskIdentity,
    pub(crate) priority: Priority,
    kind: WrapperKind<S>,
}

impl<S: PriorityScheduler> TaskWrapper<S> {
    pub(crate) fn runnable(id: TaskId, task: Task, priority: Priority) -> Self {
        Self {
            id,
            identity: task.identity(),
            priority,
            kind: WrapperKind::Runnable(task),
        }
    }

    pub(crate) fn runnable_with_result<T: TaskResult>(
        id: TaskId,
        identity: TaskIdentity,
        priority: Priority,
        body: Box<dyn FnOnce() -> T + Send + 'static>,
    ) -> (Self, DeferredFuture<T>) {
        let (pending, deferred) = Self::pending(body);
        let wrapper = Self {
            id,
            identity,
            priority,
            kind: WrapperKind::RunnableWithResult(pending),
        };
        (wrapper, deferred)
    }

    pub(crate) fn callable<T: TaskResult>(
        id: TaskId,
        identity: TaskIdentity,
        priority: Priority,
        body: Box<dyn FnOnce() -> T + Send + 'static>,
    ) -> (Self, DeferredFuture<T>) {
        let (pending, deferred) = Self::pending(body);
        let wrapper = Self {
            id,
            identity,
            priority,
            kind: WrapperKind::Callable(pending),
        };
        (wrapper, deferred)
    }

    pub(crate) fn recurring(id: TaskId, task: Arc<RecurringTask>, priority: Priority) -> Self {
        Self {
            id,
            identity: task.task().identity(),
            priority,
            kind: WrapperKind::Recurring(task),
        }
    }

    fn pending<T: TaskResult>(
        body: Box<dyn FnOnce() -> T + Send + 'static>,
    ) -> (Box<dyn PendingSubmit<S>>, DeferredFuture<T>) {
        let deferred = DeferredFuture::new();
        let pending: Box<dyn PendingSubmit<S>> = Box::new(FutureSubmit {
            body,
            deferred: deferred.clone(),
        });
        (pending, deferred)
    }

    /// Whether `remove` should excise this wrapper: the pending cycle of
    /// `stopped` when a recurring registration was cancelled, otherwise a
    /// one-shot submission of `identity`.
    pub(crate) fn is_removal_target(
        &self,
        identity: TaskIdentity,
        stopped: Option<&Arc<RecurringTask>>,
    ) -> bool {
        match (&self.kind, stopped) {
            (WrapperKind::Recurring(task), Some(stopped)) => Arc::ptr_eq(task, stopped),
            (WrapperKind::Recurring(_), None) | (_, Some(_)) => false,
            (_, None) => self.identity == identity,
        }
    }

    /// Short label used in logs.
    pub(crate) const fn kind_name(&self) -> &'static str {
        match self.kind {
            WrapperKind::Runnable(_) => "runnable",
            WrapperKind::RunnableWithResult(_) => "runnable_with_result",
            WrapperKind::Callable(_) => "callable",
            WrapperKind::Recurring(_) => "recurring",
        }
    }

    /// Hand the wrapper to the scheduler; `slot` travels with the job and is
    /// released when it finishes or when the scheduler drops it.
    ///
    /// On rejection the wrapper's future is bound to `TaskError::Rejected`
    /// and a recurring task stops.
    pub(crate) fn dispatch(
        self,
        inner: &Arc<LimiterInner<S>>,
        slot: SlotGuard<S>,
    ) -> Result<(), SchedulerError> {
        tracing::debug!(
            task_id = self.id,
            kind = self.kind_name(),
            priority = %self.priority,
            "dispatching task"
        );
        let priority = self.priority;
        match self.kind {
            WrapperKind::Runnable(task) => {
                let handler = inner.exception_handler().cloned();
                let name = inner.sub_pool_name().map(str::to_owned);
                let job = Box::new(move || {
                    let _name = ThreadNameGuard::enter(name.as_deref());
                    let _slot = slot;
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
                        handle_uncaught(handler.as_ref(), payload);
                    }
                });
                inner.scheduler().execute(job, priority)
            }
            WrapperKind::RunnableWithResult(pending) | WrapperKind::Callable(pending) => {
                pending.dispatch(inner, priority, slot)
            }
            WrapperKind::Recurring(task) => {
                if task.is_cancelled() {
                    drop(slot);
                    return Ok(());
                }
                let handle = Arc::clone(&task);
                let limiter = Arc::clone(inner);
                let job = Box::new(move || recurring::run_cycle(&limiter, task, priority, slot));
                let result = inner.scheduler().execute(job, priority);
                if result.is_err() {
                    handle.cancel();
                    inner.forget_cancelled_recurring();
                }
                result
            }
        }
    }

    /// Discard the wrapper without running it.
    pub(crate) fn abandon(self, error: TaskError) {
        tracing::debug!(
            task_id = self.id,
            kind = self.kind_name(),
            %error,
            "abandoning task"
        );
        match self.kind {
            WrapperKind::Runnable(_) => {
                if error != TaskError::Cancelled {
                    tracing::warn!("dropping task {} without running it: {}", self.id, error);
                }
            }
            WrapperKind::RunnableWithResult(pending) | WrapperKind::Callable(pending) => {
                pending.abandon(error);
            }
            WrapperKind::Recurring(task) => {
                task.cancel();
            }
        }
    }
}
