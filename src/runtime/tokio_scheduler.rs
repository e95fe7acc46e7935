//! Priority scheduler backed by a tokio runtime.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::config::SchedulerConfig;
use crate::core::{Job, PriorityScheduler, SchedulerError, TaskError, TaskResult};
use crate::future::{FutureHandle, SettableFuture};
use crate::util::exception::handle_uncaught;
use crate::util::serde::Priority;

/// Ready jobs, high priority first, FIFO within a priority.
#[derive(Default)]
struct Lanes {
    high: VecDeque<Job>,
    low: VecDeque<Job>,
}

impl Lanes {
    fn push(&mut self, job: Job, priority: Priority) {
        match priority {
            Priority::High => self.high.push_back(job),
            Priority::Low => self.low.push_back(job),
        }
    }

    fn pop(&mut self) -> Option<Job> {
        self.high.pop_front().or_else(|| self.low.pop_front())
    }

    fn len(&self) -> usize {
        self.high.len() + self.low.len()
    }
}

struct SchedulerInner {
    handle: Handle,
    runtime: Mutex<Option<Runtime>>,
    default_priority: Priority,
    active: AtomicUsize,
    /// Written only while `lanes` is locked, so no job is pushed after
    /// shutdown took the lanes.
    shutdown: AtomicBool,
    lanes: Mutex<Lanes>,
}

impl SchedulerInner {
    /// Run the most urgent ready job on the current blocking thread.
    fn pump(&self) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }
        let Some(job) = self.lanes.lock().pop() else {
            return;
        };
        self.active.fetch_add(1, Ordering::AcqRel);
        let _active = ActiveGuard(&self.active);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            handle_uncaught(None, payload);
        }
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Fails its future if the job is dropped without running.
struct Completion<T>(Arc<SettableFuture<T>>);

impl<T> Completion<T> {
    fn run<F: FnOnce() -> T>(&self, job: F) {
        self.0.complete_with(job);
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        self.0
            .set_failure(TaskError::Rejected(SchedulerError::Shutdown.to_string()));
    }
}

/// Tokio-based scheduler running jobs on the runtime's blocking pool.
///
/// Every `execute` queues the job in a priority lane and spawns one blocking
/// pump, which runs the most urgent job ready when it starts. Delays use the
/// runtime's timer, so the runtime must have time enabled.
#[derive(Clone)]
pub struct TokioScheduler {
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioScheduler").finish_non_exhaustive()
    }
}

impl TokioScheduler {
    /// Create a scheduler on an existing runtime.
    #[must_use]
    pub fn new(handle: Handle, default_priority: Priority) -> Self {
        Self::build(handle, None, default_priority)
    }

    /// Create a scheduler owning a new multi-threaded runtime.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while building the runtime.
    pub fn from_config(cfg: &SchedulerConfig) -> Result<Self, std::io::Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(cfg.worker_threads)
            .max_blocking_threads(cfg.max_blocking_threads)
            .thread_name(cfg.thread_name.clone())
            .enable_all()
            .build()?;
        tracing::info!(
            worker_threads = cfg.worker_threads,
            max_blocking_threads = cfg.max_blocking_threads,
            "tokio scheduler runtime started"
        );
        Ok(Self::build(
            runtime.handle().clone(),
            Some(runtime),
            cfg.default_priority,
        ))
    }

    fn build(handle: Handle, runtime: Option<Runtime>, default_priority: Priority) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                handle,
                runtime: Mutex::new(runtime),
                default_priority,
                active: AtomicUsize::new(0),
                shutdown: AtomicBool::new(false),
                lanes: Mutex::new(Lanes::default()),
            }),
        }
    }

    /// Stop accepting work and drop jobs that have not started.
    ///
    /// Jobs already running finish on their threads. An owned runtime is shut
    /// down in the background.
    pub fn shutdown(&self) {
        let pending = {
            let mut lanes = self.inner.lanes.lock();
            if self.inner.shutdown.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *lanes)
        };
        tracing::info!(dropped = pending.len(), "tokio scheduler shutting down");
        drop(pending);
        if let Some(runtime) = self.inner.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }

    /// Jobs accepted but not started yet.
    pub fn queued_job_count(&self) -> usize {
        self.inner.lanes.lock().len()
    }

    /// Handle of the runtime the scheduler spawns onto.
    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }
}

impl PriorityScheduler for TokioScheduler {
    fn default_priority(&self) -> Priority {
        self.inner.default_priority
    }

    fn execute(&self, job: Job, priority: Priority) -> Result<(), SchedulerError> {
        let rejected = {
            let mut lanes = self.inner.lanes.lock();
            if self.is_shutdown() {
                Some(job)
            } else {
                lanes.push(job, priority);
                None
            }
        };
        // Dropped outside the lock: a job's drop may submit again.
        if let Some(job) = rejected {
            drop(job);
            return Err(SchedulerError::Shutdown);
        }
        let inner = Arc::clone(&self.inner);
        self.inner.handle.spawn_blocking(move || inner.pump());
        Ok(())
    }

    fn submit<T: TaskResult>(
        &self,
        job: Box<dyn FnOnce() -> T + Send + 'static>,
        priority: Priority,
    ) -> Result<FutureHandle<T>, SchedulerError> {
        let future = Arc::new(SettableFuture::new());
        let completion = Completion(Arc::clone(&future));
        self.execute(
            Box::new(move || {
                completion.run(job);
            }),
            priority,
        )?;
        Ok(future as FutureHandle<T>)
    }

    fn schedule(&self, job: Job, delay: Duration, priority: Priority) -> Result<(), SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::Shutdown);
        }
        if delay.is_zero() {
            return self.execute(job, priority);
        }
        let scheduler = self.clone();
        self.inner.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = scheduler.execute(job, priority) {
                tracing::debug!("timer fired after shutdown: {}", err);
            }
        });
        Ok(())
    }

    fn active_task_count(&self) -> usize {
        self.inner.active.load(Ordering::Acquire)
    }

    fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }
}
