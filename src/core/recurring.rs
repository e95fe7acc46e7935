//! Fixed-delay recurring tasks.
//!
//! A recurring task is not special to the scheduler. Each cycle is an
//! ordinary admitted submission; when it ends, successfully or by panic, it
//! releases its slot and submits the next cycle through the limiter's
//! delayed path.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::limiter::{LimiterInner, SlotGuard};
use crate::core::{PriorityScheduler, Task};
use crate::util::exception::handle_uncaught;
use crate::util::serde::Priority;
use crate::util::thread_name::ThreadNameGuard;

/// Registration of a task that repeats until removed.
#[derive(Debug)]
pub(crate) struct RecurringTask {
    task: Task,
    recurring_delay: Duration,
    cancelled: AtomicBool,
}

impl RecurringTask {
    pub(crate) const fn new(task: Task, recurring_delay: Duration) -> Self {
        Self {
            task,
            recurring_delay,
            cancelled: AtomicBool::new(false),
        }
    }

    pub(crate) const fn task(&self) -> &Task {
        &self.task
    }

    pub(crate) const fn recurring_delay(&self) -> Duration {
        self.recurring_delay
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Stop future cycles; `true` if this call did it.
    pub(crate) fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }
}

/// Run one cycle on a scheduler thread holding `slot`.
pub(crate) fn run_cycle<S: PriorityScheduler>(
    inner: &Arc<LimiterInner<S>>,
    recurring: Arc<RecurringTask>,
    priority: Priority,
    slot: SlotGuard<S>,
) {
    let name = ThreadNameGuard::enter(inner.sub_pool_name());
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| recurring.task.run())) {
        handle_uncaught(inner.exception_handler(), payload);
    }
    drop(slot);
    if !recurring.is_cancelled() {
        inner.reschedule_recurring(recurring, priority);
    }
    drop(name);
}
