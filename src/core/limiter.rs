//! Bounded-concurrency limiter in front of a priority scheduler.
//!
//! A [`PrioritySchedulerLimiter`] caps how many of the tasks submitted
//! through it run on the underlying scheduler at once. It owns no threads:
//!
//! - a submission takes an admission slot and goes straight to the scheduler
//!   when one is free and nothing is waiting ahead of it;
//! - otherwise it joins a FIFO waiting queue, drained whenever a slot frees;
//! - delayed work waits in the limiter, holding no slot, until the
//!   scheduler's timer hands its ticket back for admission.
//!
//! ```
//! use std::time::Duration;
//! # use prometheus_priority_limiter::core::{Job, PriorityScheduler, SchedulerError, TaskResult};
//! # use prometheus_priority_limiter::future::{FutureHandle, SettableFuture};
//! # use prometheus_priority_limiter::util::serde::Priority;
//! use prometheus_priority_limiter::{ListenableFuture, PrioritySchedulerLimiter, Task};
//!
//! # struct Inline;
//! # impl PriorityScheduler for Inline {
//! #     fn default_priority(&self) -> Priority { Priority::High }
//! #     fn execute(&self, job: Job, _: Priority) -> Result<(), SchedulerError> { job(); Ok(()) }
//! #     fn submit<T: TaskResult>(
//! #         &self,
//! #         job: Box<dyn FnOnce() -> T + Send + 'static>,
//! #         _: Priority,
//! #     ) -> Result<FutureHandle<T>, SchedulerError> {
//! #         let future = SettableFuture::new();
//! #         future.complete_with(job);
//! #         Ok(std::sync::Arc::new(future))
//! #     }
//! #     fn schedule(&self, job: Job, _: Duration, _: Priority) -> Result<(), SchedulerError> { job(); Ok(()) }
//! #     fn active_task_count(&self) -> usize { 0 }
//! #     fn is_shutdown(&self) -> bool { false }
//! # }
//! let limiter = PrioritySchedulerLimiter::new(Inline, 2)?;
//! let future = limiter.submit_with_result(Task::new(|| {}), 7_u32, None)?;
//! assert_eq!(future.get(), Ok(7));
//! assert_eq!(limiter.in_flight_count(), 0);
//! # Ok::<(), prometheus_priority_limiter::core::LimiterError>(())
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};

use crate::core::admission::AdmissionCounter;
use crate::core::recurring::RecurringTask;
use crate::core::wrapper::TaskWrapper;
use crate::core::{
    CallableTask, Executor, Identifiable, Job, LimiterError, PriorityScheduler, SchedulerError,
    Task, TaskError, TaskIdentity, TaskResult,
};
use crate::future::DeferredFuture;
use crate::util::exception::ExceptionHandler;
use crate::util::serde::{Priority, TaskId};

/// Shared state behind every clone of a limiter.
pub(crate) struct LimiterInner<S: PriorityScheduler> {
    scheduler: S,
    admission: AdmissionCounter,
    waiting: Mutex<VecDeque<TaskWrapper<S>>>,
    /// Serializes drains; reentrant so a slot released while dispatching on
    /// the draining thread can drain again.
    drain_lock: ReentrantMutex<()>,
    /// Wrappers whose delay has not elapsed, claimed by ticket when it fires.
    delayed: Mutex<Vec<TaskWrapper<S>>>,
    recurring: Mutex<Vec<Arc<RecurringTask>>>,
    /// Listener forwards of freshly bound futures, run outside the drain lock.
    forwards: Mutex<Vec<Job>>,
    sub_pool_name: Option<String>,
    exception_handler: Option<Arc<dyn ExceptionHandler>>,
    next_id: AtomicU64,
}

/// One held admission slot. Dropping it releases the slot and drains.
pub(crate) struct SlotGuard<S: PriorityScheduler> {
    inner: Arc<LimiterInner<S>>,
}

impl<S: PriorityScheduler> SlotGuard<S> {
    /// Take ownership of a slot already acquired from `inner.admission`.
    fn acquired(inner: &Arc<LimiterInner<S>>) -> Self {
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl<S: PriorityScheduler> Drop for SlotGuard<S> {
    fn drop(&mut self) {
        self.inner.admission.release();
        self.inner.drain();
    }
}

/// Timer payload for one delayed wrapper.
///
/// Dropping it unfired, as a scheduler does with timers pending at
/// shutdown, abandons the wrapper so its future still resolves.
struct DelayedTimer<S: PriorityScheduler> {
    inner: Weak<LimiterInner<S>>,
    ticket: TaskId,
}

impl<S: PriorityScheduler> DelayedTimer<S> {
    fn fire(mut self) {
        let weak = std::mem::take(&mut self.inner);
        if let Some(inner) = weak.upgrade() {
            inner.fire_delayed(self.ticket);
        }
    }
}

impl<S: PriorityScheduler> Drop for DelayedTimer<S> {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        if let Some(wrapper) = inner.claim_delayed(self.ticket) {
            tracing::warn!(task_id = self.ticket, "delay timer dropped before firing");
            wrapper.abandon(TaskError::Rejected(TIMER_DROPPED.into()));
            inner.forget_cancelled_recurring();
        }
    }
}

const TIMER_DROPPED: &str = "delay timer dropped before firing";

impl<S: PriorityScheduler> LimiterInner<S> {
    pub(crate) const fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub(crate) fn sub_pool_name(&self) -> Option<&str> {
        self.sub_pool_name.as_deref()
    }

    pub(crate) const fn exception_handler(&self) -> Option<&Arc<dyn ExceptionHandler>> {
        self.exception_handler.as_ref()
    }

    fn next_id(&self) -> TaskId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Dispatch now if a slot is free and nobody is waiting, else enqueue.
    ///
    /// Only an immediate dispatch can report a scheduler rejection; queued
    /// wrappers are resolved by the drain.
    fn admit(self: &Arc<Self>, wrapper: TaskWrapper<S>) -> Result<(), SchedulerError> {
        let fast = {
            let waiting = self.waiting.lock();
            waiting.is_empty() && self.admission.try_acquire()
        };
        if fast {
            let slot = SlotGuard::acquired(self);
            let dispatched = wrapper.dispatch(self, slot);
            self.run_forwards();
            return dispatched;
        }

        let (task_id, queued) = {
            let mut waiting = self.waiting.lock();
            let task_id = wrapper.id;
            waiting.push_back(wrapper);
            (task_id, waiting.len())
        };
        tracing::debug!(
            task_id,
            queued,
            active = self.admission.active(),
            "task queued at concurrency ceiling"
        );
        self.drain();
        Ok(())
    }

    /// Move admissible waiting tasks onto the scheduler.
    ///
    /// Once the scheduler is shut down, waiting and delayed wrappers are
    /// abandoned instead, after the drain lock is released.
    fn drain(self: &Arc<Self>) {
        let stranded = {
            let _serial = self.drain_lock.lock();
            if self.scheduler.is_shutdown() {
                self.take_stranded()
            } else {
                self.dispatch_waiting();
                Vec::new()
            }
        };
        if !stranded.is_empty() {
            tracing::warn!(
                "scheduler shut down; abandoning {} queued or delayed task(s)",
                stranded.len()
            );
            for wrapper in stranded {
                wrapper.abandon(TaskError::Rejected(SchedulerError::Shutdown.to_string()));
            }
            self.forget_cancelled_recurring();
        }
        self.run_forwards();
    }

    fn dispatch_waiting(self: &Arc<Self>) {
        loop {
            if self.waiting.lock().is_empty() || !self.admission.try_acquire() {
                break;
            }
            let slot = SlotGuard::acquired(self);
            // `remove` may have emptied the queue since the check.
            let Some(wrapper) = self.waiting.lock().pop_front() else {
                break;
            };
            let task_id = wrapper.id;
            if let Err(err) = wrapper.dispatch(self, slot) {
                tracing::warn!("scheduler rejected queued task {}: {}", task_id, err);
            }
        }
    }

    fn take_stranded(&self) -> Vec<TaskWrapper<S>> {
        let mut stranded: Vec<_> = std::mem::take(&mut *self.waiting.lock()).into();
        stranded.append(&mut self.delayed.lock());
        stranded
    }

    /// Hold `forward` until no drain is running on this thread.
    pub(crate) fn defer_forward(&self, forward: Job) {
        self.forwards.lock().push(forward);
    }

    fn run_forwards(&self) {
        if self.drain_lock.is_owned_by_current_thread() {
            return;
        }
        loop {
            let forwards = std::mem::take(&mut *self.forwards.lock());
            if forwards.is_empty() {
                return;
            }
            for forward in forwards {
                forward();
            }
        }
    }

    /// Admit `wrapper` after `delay`, without holding a slot while waiting.
    pub(crate) fn schedule_delayed(
        self: &Arc<Self>,
        wrapper: TaskWrapper<S>,
        delay: Duration,
    ) -> Result<(), SchedulerError> {
        if delay.is_zero() {
            return self.admit(wrapper);
        }

        let ticket = wrapper.id;
        let priority = wrapper.priority;
        self.delayed.lock().push(wrapper);

        let timer = DelayedTimer {
            inner: Arc::downgrade(self),
            ticket,
        };
        let timer: Job = Box::new(move || timer.fire());
        if let Err(err) = self.scheduler.schedule(timer, delay, priority) {
            if let Some(wrapper) = self.claim_delayed(ticket) {
                wrapper.abandon(TaskError::Rejected(err.to_string()));
            }
            return Err(err);
        }
        tracing::debug!(task_id = ticket, ?delay, "task parked until delay elapses");
        Ok(())
    }

    fn claim_delayed(&self, ticket: TaskId) -> Option<TaskWrapper<S>> {
        let mut delayed = self.delayed.lock();
        let index = delayed.iter().position(|wrapper| wrapper.id == ticket)?;
        Some(delayed.remove(index))
    }

    fn fire_delayed(self: &Arc<Self>, ticket: TaskId) {
        let Some(wrapper) = self.claim_delayed(ticket) else {
            tracing::debug!("delayed task {} was removed before it fired", ticket);
            return;
        };
        if let Err(err) = self.admit(wrapper) {
            tracing::warn!("scheduler rejected delayed task {}: {}", ticket, err);
        }
    }

    /// Submit the next cycle of `task` through the delayed path.
    pub(crate) fn reschedule_recurring(self: &Arc<Self>, task: Arc<RecurringTask>, priority: Priority) {
        let delay = task.recurring_delay();
        let wrapper = TaskWrapper::recurring(self.next_id(), Arc::clone(&task), priority);
        if let Err(err) = self.schedule_delayed(wrapper, delay) {
            tracing::warn!("recurring task stopped, next cycle rejected: {}", err);
            task.cancel();
            self.forget_cancelled_recurring();
        }
    }

    pub(crate) fn forget_cancelled_recurring(&self) {
        self.recurring.lock().retain(|task| !task.is_cancelled());
    }

    /// Cancel the oldest live registration of the task with `identity`.
    fn cancel_recurring(&self, identity: TaskIdentity) -> Option<Arc<RecurringTask>> {
        let mut registry = self.recurring.lock();
        let index = registry
            .iter()
            .position(|task| !task.is_cancelled() && task.task().identity() == identity)?;
        let task = registry.remove(index);
        task.cancel();
        Some(task)
    }

    /// Take the first pending wrapper `remove` should excise: the pending
    /// cycle of `stopped` if given, else a one-shot submission of `identity`.
    fn take_pending(
        &self,
        identity: TaskIdentity,
        stopped: Option<&Arc<RecurringTask>>,
    ) -> Option<TaskWrapper<S>> {
        {
            let mut waiting = self.waiting.lock();
            if let Some(index) = waiting.iter().position(|w| w.is_removal_target(identity, stopped)) {
                return waiting.remove(index);
            }
        }
        let mut delayed = self.delayed.lock();
        let index = delayed
            .iter()
            .position(|w| w.is_removal_target(identity, stopped))?;
        Some(delayed.remove(index))
    }
}

impl<S: PriorityScheduler> Drop for LimiterInner<S> {
    fn drop(&mut self) {
        let pending: Vec<_> = self
            .waiting
            .get_mut()
            .drain(..)
            .chain(self.delayed.get_mut().drain(..))
            .collect();
        for wrapper in pending {
            wrapper.abandon(TaskError::Cancelled);
        }
        for task in self.recurring.get_mut().drain(..) {
            task.cancel();
        }
        for forward in self.forwards.get_mut().drain(..) {
            forward();
        }
    }
}

/// Caps concurrent execution of tasks on a shared [`PriorityScheduler`].
///
/// Cloning is cheap and yields a handle to the same limiter. Dropping the
/// last handle cancels work that is still queued or waiting on a delay;
/// tasks already on the scheduler run to completion.
pub struct PrioritySchedulerLimiter<S: PriorityScheduler> {
    inner: Arc<LimiterInner<S>>,
}

impl<S: PriorityScheduler> Clone for PrioritySchedulerLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: PriorityScheduler> fmt::Debug for PrioritySchedulerLimiter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrioritySchedulerLimiter")
            .field("max_concurrency", &self.max_concurrency())
            .field("in_flight", &self.in_flight_count())
            .field("queued", &self.queued_task_count())
            .field("scheduled", &self.scheduled_task_count())
            .field("sub_pool_name", &self.sub_pool_name())
            .finish_non_exhaustive()
    }
}

impl<S: PriorityScheduler> PrioritySchedulerLimiter<S> {
    /// Creates a limiter allowing at most `max_concurrency` tasks on
    /// `scheduler` at once.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::InvalidConcurrency` when `max_concurrency` is 0.
    pub fn new(scheduler: S, max_concurrency: usize) -> Result<Self, LimiterError> {
        Self::with_options(scheduler, max_concurrency, None, None)
    }

    pub(crate) fn with_options(
        scheduler: S,
        max_concurrency: usize,
        sub_pool_name: Option<String>,
        exception_handler: Option<Arc<dyn ExceptionHandler>>,
    ) -> Result<Self, LimiterError> {
        let admission = AdmissionCounter::new(max_concurrency)?;
        tracing::info!(
            max_concurrency,
            sub_pool = sub_pool_name.as_deref().unwrap_or("-"),
            "priority scheduler limiter created"
        );
        Ok(Self {
            inner: Arc::new(LimiterInner {
                scheduler,
                admission,
                waiting: Mutex::new(VecDeque::new()),
                drain_lock: ReentrantMutex::new(()),
                delayed: Mutex::new(Vec::new()),
                recurring: Mutex::new(Vec::new()),
                forwards: Mutex::new(Vec::new()),
                sub_pool_name,
                exception_handler,
                next_id: AtomicU64::new(1),
            }),
        })
    }

    fn ensure_running(&self) -> Result<(), LimiterError> {
        if self.inner.scheduler.is_shutdown() {
            return Err(SchedulerError::Shutdown.into());
        }
        Ok(())
    }

    fn resolve(&self, priority: Option<Priority>) -> Priority {
        priority.unwrap_or_else(|| self.inner.scheduler.default_priority())
    }

    /// Run `task` once, fire-and-forget.
    ///
    /// A panic in the task is routed to the exception handler.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects an immediate dispatch.
    pub fn execute(&self, task: Task, priority: Option<Priority>) -> Result<(), LimiterError> {
        self.schedule(task, Duration::ZERO, priority)
    }

    /// Run `task` once and expose its completion through a future.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects an immediate dispatch.
    pub fn submit(
        &self,
        task: Task,
        priority: Option<Priority>,
    ) -> Result<DeferredFuture<()>, LimiterError> {
        self.submit_scheduled_with_result(task, (), Duration::ZERO, priority)
    }

    /// Run `task` once; its future yields `result` on success.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects an immediate dispatch.
    pub fn submit_with_result<T: TaskResult>(
        &self,
        task: Task,
        result: T,
        priority: Option<Priority>,
    ) -> Result<DeferredFuture<T>, LimiterError> {
        self.submit_scheduled_with_result(task, result, Duration::ZERO, priority)
    }

    /// Run `callable` once; its future yields the returned value.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects an immediate dispatch.
    pub fn submit_callable<T: TaskResult>(
        &self,
        callable: CallableTask<T>,
        priority: Option<Priority>,
    ) -> Result<DeferredFuture<T>, LimiterError> {
        self.submit_scheduled_callable(callable, Duration::ZERO, priority)
    }

    /// Run `task` once after `delay`, fire-and-forget.
    ///
    /// A zero delay takes the immediate admission path.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects the timer.
    pub fn schedule(
        &self,
        task: Task,
        delay: Duration,
        priority: Option<Priority>,
    ) -> Result<(), LimiterError> {
        self.ensure_running()?;
        let wrapper = TaskWrapper::runnable(self.inner.next_id(), task, self.resolve(priority));
        self.inner.schedule_delayed(wrapper, delay)?;
        Ok(())
    }

    /// Run `task` once after `delay` and expose its completion through a future.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects the timer.
    pub fn submit_scheduled(
        &self,
        task: Task,
        delay: Duration,
        priority: Option<Priority>,
    ) -> Result<DeferredFuture<()>, LimiterError> {
        self.submit_scheduled_with_result(task, (), delay, priority)
    }

    /// Run `task` once after `delay`; its future yields `result` on success.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects the timer.
    pub fn submit_scheduled_with_result<T: TaskResult>(
        &self,
        task: Task,
        result: T,
        delay: Duration,
        priority: Option<Priority>,
    ) -> Result<DeferredFuture<T>, LimiterError> {
        self.ensure_running()?;
        let identity = task.identity();
        let (wrapper, future) = TaskWrapper::runnable_with_result(
            self.inner.next_id(),
            identity,
            self.resolve(priority),
            Box::new(move || {
                task.run();
                result
            }),
        );
        self.inner.schedule_delayed(wrapper, delay)?;
        Ok(future)
    }

    /// Run `callable` once after `delay`; its future yields the returned value.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects the timer.
    pub fn submit_scheduled_callable<T: TaskResult>(
        &self,
        callable: CallableTask<T>,
        delay: Duration,
        priority: Option<Priority>,
    ) -> Result<DeferredFuture<T>, LimiterError> {
        self.ensure_running()?;
        let identity = callable.identity();
        let (wrapper, future) = TaskWrapper::callable(
            self.inner.next_id(),
            identity,
            self.resolve(priority),
            Box::new(move || callable.call()),
        );
        self.inner.schedule_delayed(wrapper, delay)?;
        Ok(future)
    }

    /// Run `task` after `initial_delay`, then repeatedly with
    /// `recurring_delay` between the end of one run and the start of the next.
    ///
    /// Every cycle is admitted through this limiter. A cycle that panics is
    /// reported to the exception handler and the task keeps recurring until
    /// [`remove`](Self::remove)d.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler is shut down or rejects the first cycle.
    pub fn schedule_with_fixed_delay(
        &self,
        task: Task,
        initial_delay: Duration,
        recurring_delay: Duration,
        priority: Option<Priority>,
    ) -> Result<(), LimiterError> {
        self.ensure_running()?;
        let recurring = Arc::new(RecurringTask::new(task, recurring_delay));
        self.inner.recurring.lock().push(Arc::clone(&recurring));
        let wrapper =
            TaskWrapper::recurring(self.inner.next_id(), Arc::clone(&recurring), self.resolve(priority));
        if let Err(err) = self.inner.schedule_delayed(wrapper, initial_delay) {
            recurring.cancel();
            self.inner.forget_cancelled_recurring();
            return Err(err.into());
        }
        Ok(())
    }

    /// Remove `task` if it has not been handed to the scheduler yet.
    ///
    /// A recurring task stops recurring; a cycle already running finishes.
    /// One call removes one registration: the oldest recurring one if the
    /// task recurs, else the oldest pending one-shot submission.
    /// Removed future-bearing submissions resolve with `TaskError::Cancelled`.
    /// Returns `false` when nothing matched, in which case a dispatched task
    /// still runs to completion.
    pub fn remove<R: Identifiable + ?Sized>(&self, task: &R) -> bool {
        let identity = task.identity();
        let stopped = self.inner.cancel_recurring(identity);
        let removed = self.inner.take_pending(identity, stopped.as_ref());
        let found = removed.is_some();
        if let Some(wrapper) = removed {
            tracing::debug!(task_id = wrapper.id, "removed task before dispatch");
            wrapper.abandon(TaskError::Cancelled);
        }
        stopped.is_some() || found
    }

    /// Tasks the underlying scheduler reports as running.
    pub fn active_task_count(&self) -> usize {
        self.inner.scheduler.active_task_count()
    }

    /// Admission slots currently held by this limiter's tasks.
    pub fn in_flight_count(&self) -> usize {
        self.inner.admission.active()
    }

    /// Tasks waiting for an admission slot.
    pub fn queued_task_count(&self) -> usize {
        self.inner.waiting.lock().len()
    }

    /// Delayed tasks whose delay has not elapsed yet.
    pub fn scheduled_task_count(&self) -> usize {
        self.inner.delayed.lock().len()
    }

    /// Whether the underlying scheduler is shut down.
    pub fn is_shutdown(&self) -> bool {
        self.inner.scheduler.is_shutdown()
    }

    /// Priority applied when a submission passes `None`.
    pub fn default_priority(&self) -> Priority {
        self.inner.scheduler.default_priority()
    }

    /// Concurrency ceiling.
    pub fn max_concurrency(&self) -> usize {
        self.inner.admission.ceiling()
    }

    /// Name shown on threads while they run this limiter's tasks.
    pub fn sub_pool_name(&self) -> Option<&str> {
        self.inner.sub_pool_name()
    }

    /// The underlying scheduler.
    pub fn scheduler(&self) -> &S {
        &self.inner.scheduler
    }
}

impl<S: PriorityScheduler> Executor for PrioritySchedulerLimiter<S> {
    fn execute_job(&self, job: Job) {
        let job = Mutex::new(Some(job));
        let task = Task::new(move || {
            if let Some(job) = job.lock().take() {
                job();
            }
        });
        if let Err(err) = self.execute(task, None) {
            tracing::warn!("limiter rejected listener job: {}", err);
        }
    }
}
