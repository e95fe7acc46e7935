//! Handling for panics that escape task bodies.
//!
//! Fire-and-forget and recurring tasks have nobody waiting on their result, so
//! a panic from their body is caught by the limiter and routed here instead of
//! unwinding through the scheduler's worker thread. Resolution order:
//!
//! 1. the handler configured on the limiter, if any
//! 2. the process-wide handler installed with [`set_exception_handler`]
//! 3. a `tracing::error!` report

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, Thread};

use parking_lot::RwLock;

/// Receives panics caught while running a task body.
pub trait ExceptionHandler: Send + Sync {
    /// Called on the thread that ran the task, with the panic payload.
    fn handle_exception(&self, thread: &Thread, payload: &(dyn Any + Send));
}

impl<F> ExceptionHandler for F
where
    F: Fn(&Thread, &(dyn Any + Send)) + Send + Sync,
{
    fn handle_exception(&self, thread: &Thread, payload: &(dyn Any + Send)) {
        self(thread, payload);
    }
}

static GLOBAL_HANDLER: RwLock<Option<Arc<dyn ExceptionHandler>>> = RwLock::new(None);

/// Install the process-wide exception handler, replacing any previous one.
pub fn set_exception_handler(handler: Arc<dyn ExceptionHandler>) {
    *GLOBAL_HANDLER.write() = Some(handler);
}

/// Remove the process-wide exception handler.
pub fn clear_exception_handler() {
    *GLOBAL_HANDLER.write() = None;
}

/// Currently installed process-wide handler.
pub fn exception_handler() -> Option<Arc<dyn ExceptionHandler>> {
    GLOBAL_HANDLER.read().clone()
}

/// Best-effort readable message for a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Route a caught panic to the preferred handler for the current thread.
///
/// A handler that panics itself is reported through tracing and swallowed.
pub fn handle_uncaught(preferred: Option<&Arc<dyn ExceptionHandler>>, payload: Box<dyn Any + Send>) {
    let handler = preferred.cloned().or_else(exception_handler);
    let current = thread::current();

    let Some(handler) = handler else {
        tracing::error!(
            thread = current.name().unwrap_or("<unnamed>"),
            panic = %panic_message(payload.as_ref()),
            "uncaught panic in task"
        );
        return;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        handler.handle_exception(&current, payload.as_ref());
    }));
    if let Err(handler_panic) = outcome {
        tracing::error!(
            thread = current.name().unwrap_or("<unnamed>"),
            panic = %panic_message(payload.as_ref()),
            handler_panic = %panic_message(handler_panic.as_ref()),
            "exception handler panicked"
        );
    }
}
