//! Scoped diagnostic names for threads running limiter tasks.
//!
//! The standard library cannot rename a running thread, so the sub-pool name
//! is tracked in a thread-local overlay on top of the OS thread name and
//! mirrored into a tracing span. [`current_thread_name`] returns the
//! effective name.

use std::cell::RefCell;
use std::thread;

use tracing::span::EnteredSpan;

thread_local! {
    static NAME_OVERRIDE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Effective name of the current thread, including any active sub-pool prefix.
#[must_use]
pub fn current_thread_name() -> String {
    NAME_OVERRIDE
        .with(|name| name.borrow().clone())
        .unwrap_or_else(base_thread_name)
}

/// Name shown while a thread runs work for `sub_pool`.
#[must_use]
pub fn sub_pool_thread_name(sub_pool: &str, original: &str) -> String {
    format!("{sub_pool}[{original}]")
}

fn base_thread_name() -> String {
    let current = thread::current();
    current
        .name()
        .map_or_else(|| format!("{:?}", current.id()), str::to_owned)
}

/// Restores the previous thread name when dropped, including during unwinding.
pub struct ThreadNameGuard {
    previous: Option<String>,
    _span: EnteredSpan,
}

impl ThreadNameGuard {
    /// Annotate the current thread with `sub_pool`; `None` leaves it untouched.
    #[must_use]
    pub fn enter(sub_pool: Option<&str>) -> Option<Self> {
        let sub_pool = sub_pool?;
        let renamed = sub_pool_thread_name(sub_pool, &current_thread_name());
        let previous = NAME_OVERRIDE.with(|name| name.replace(Some(renamed)));
        let span = tracing::debug_span!("sub_pool", name = sub_pool).entered();
        Some(Self {
            previous,
            _span: span,
        })
    }
}

impl Drop for ThreadNameGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        NAME_OVERRIDE.with(|name| *name.borrow_mut() = previous);
    }
}
