//! Shared schedulers and helpers for integration tests.
//!
//! - [`ManualScheduler`] only runs jobs when the test asks, so admission and
//!   drain order can be asserted step by step.
//! - [`ThreadPerJobScheduler`] runs every job on a fresh OS thread for
//!   timing and stress scenarios.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use prometheus_priority_limiter::core::{Job, PriorityScheduler, SchedulerError, TaskResult};
use prometheus_priority_limiter::future::{FutureHandle, SettableFuture};
use prometheus_priority_limiter::{Priority, PrioritySchedulerLimiter, Task};

// ============================================================================
// MANUAL SCHEDULER
// ============================================================================

/// Scheduler whose ready jobs and timers run only when the test drives them.
pub struct ManualScheduler {
    ready: Mutex<VecDeque<(Priority, Job)>>,
    timers: Mutex<Vec<(Duration, Job)>>,
    active: AtomicUsize,
    shutdown: AtomicBool,
    default_priority: Priority,
}

impl ManualScheduler {
    pub fn new() -> Arc<Self> {
        Self::with_default_priority(Priority::Low)
    }

    pub fn with_default_priority(default_priority: Priority) -> Arc<Self> {
        Arc::new(Self {
            ready: Mutex::new(VecDeque::new()),
            timers: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            default_priority,
        })
    }

    /// Run the oldest ready job on the calling thread.
    pub fn run_next(&self) -> bool {
        let Some((_, job)) = self.ready.lock().pop_front() else {
            return false;
        };
        self.active.fetch_add(1, Ordering::SeqCst);
        job();
        self.active.fetch_sub(1, Ordering::SeqCst);
        true
    }

    /// Run ready jobs until none are left; returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Fire every pending timer on the calling thread; returns how many fired.
    pub fn fire_timers(&self) -> usize {
        let timers = std::mem::take(&mut *self.timers.lock());
        let fired = timers.len();
        for (_, job) in timers {
            job();
        }
        fired
    }

    /// Drop every pending timer unfired, as a shut-down scheduler does.
    pub fn drop_timers(&self) -> usize {
        let timers = std::mem::take(&mut *self.timers.lock());
        timers.len()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.lock().len()
    }

    pub fn timer_len(&self) -> usize {
        self.timers.lock().len()
    }

    /// Delays of the pending timers, in registration order.
    pub fn timer_delays(&self) -> Vec<Duration> {
        self.timers.lock().iter().map(|(delay, _)| *delay).collect()
    }

    /// Priorities the ready jobs were submitted with, oldest first.
    pub fn ready_priorities(&self) -> Vec<Priority> {
        self.ready.lock().iter().map(|(priority, _)| *priority).collect()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    fn accepting(&self) -> Result<(), SchedulerError> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SchedulerError::Shutdown);
        }
        Ok(())
    }
}

impl PriorityScheduler for ManualScheduler {
    fn default_priority(&self) -> Priority {
        self.default_priority
    }

    fn execute(&self, job: Job, priority: Priority) -> Result<(), SchedulerError> {
        self.accepting()?;
        self.ready.lock().push_back((priority, job));
        Ok(())
    }

    fn submit<T: TaskResult>(
        &self,
        job: Box<dyn FnOnce() -> T + Send + 'static>,
        priority: Priority,
    ) -> Result<FutureHandle<T>, SchedulerError> {
        let future = Arc::new(SettableFuture::new());
        let completer = Arc::clone(&future);
        self.execute(
            Box::new(move || {
                completer.complete_with(job);
            }),
            priority,
        )?;
        Ok(future as FutureHandle<T>)
    }

    fn schedule(&self, job: Job, delay: Duration, _priority: Priority) -> Result<(), SchedulerError> {
        self.accepting()?;
        self.timers.lock().push((delay, job));
        Ok(())
    }

    fn active_task_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

// ============================================================================
// THREAD-PER-JOB SCHEDULER
// ============================================================================

/// Scheduler that spawns one OS thread per job and sleeps for delays.
#[derive(Default)]
pub struct ThreadPerJobScheduler {
    active: Arc<AtomicUsize>,
}

impl ThreadPerJobScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl PriorityScheduler for ThreadPerJobScheduler {
    fn default_priority(&self) -> Priority {
        Priority::High
    }

    fn execute(&self, job: Job, _priority: Priority) -> Result<(), SchedulerError> {
        let active = Arc::clone(&self.active);
        active.fetch_add(1, Ordering::SeqCst);
        thread::Builder::new()
            .name("job-worker".into())
            .spawn(move || {
                job();
                active.fetch_sub(1, Ordering::SeqCst);
            })
            .map_err(|e| SchedulerError::Backend(e.to_string()))?;
        Ok(())
    }

    fn submit<T: TaskResult>(
        &self,
        job: Box<dyn FnOnce() -> T + Send + 'static>,
        priority: Priority,
    ) -> Result<FutureHandle<T>, SchedulerError> {
        let future = Arc::new(SettableFuture::new());
        let completer = Arc::clone(&future);
        self.execute(
            Box::new(move || {
                completer.complete_with(job);
            }),
            priority,
        )?;
        Ok(future as FutureHandle<T>)
    }

    fn schedule(&self, job: Job, delay: Duration, _priority: Priority) -> Result<(), SchedulerError> {
        thread::spawn(move || {
            thread::sleep(delay);
            job();
        });
        Ok(())
    }

    fn active_task_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn is_shutdown(&self) -> bool {
        false
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub type ManualLimiter = PrioritySchedulerLimiter<Arc<ManualScheduler>>;

pub fn manual_limiter(max_concurrency: usize) -> (Arc<ManualScheduler>, ManualLimiter) {
    let scheduler = ManualScheduler::new();
    let limiter = PrioritySchedulerLimiter::new(Arc::clone(&scheduler), max_concurrency)
        .expect("valid ceiling");
    (scheduler, limiter)
}

pub fn counting_task(counter: &Arc<AtomicUsize>) -> Task {
    let counter = Arc::clone(counter);
    Task::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

/// Task appending `label` to `log` when it runs.
pub fn logging_task(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> Task {
    let log = Arc::clone(log);
    Task::new(move || log.lock().push(label))
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
