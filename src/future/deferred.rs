//! Future whose parent is bound after the caller already holds it.
//!
//! A limiter returns a [`DeferredFuture`] from every future-bearing
//! submission. If the task is admitted right away the parent is bound before
//! the call returns; if it is queued or delayed, binding happens later on
//! whichever thread admits it. Until then:
//!
//! - [`ListenableFuture::add_listener`], [`get`](ListenableFuture::get) and
//!   [`get_timeout`](ListenableFuture::get_timeout) block the calling thread
//!   until the parent exists, then delegate.
//! - [`DeferredFuture::subscribe`] never blocks; listeners are held and
//!   forwarded in registration order on bind.
//! - [`cancel`](ListenableFuture::cancel) is rejected and returns `false`;
//!   queued work is cancelled through the limiter's `remove`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::core::{Executor, Job, TaskError, TaskResult};
use crate::future::{FutureHandle, ListenableFuture, Listener};
use crate::once::BindCell;

type EarlyListeners = Vec<(Listener, Option<Arc<dyn Executor>>)>;

struct DeferredInner<T> {
    parent: BindCell<FutureHandle<T>>,
    /// `Some` until the parent is bound and held listeners are forwarded.
    early: Mutex<Option<EarlyListeners>>,
}

/// Caller-side handle to a task that may not be admitted yet.
///
/// Clones share the same binding.
pub struct DeferredFuture<T> {
    inner: Arc<DeferredInner<T>>,
}

impl<T> Clone for DeferredFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for DeferredFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DeferredFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredFuture")
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl<T> DeferredFuture<T> {
    /// Creates an unbound future.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DeferredInner {
                parent: BindCell::new(),
                early: Mutex::new(Some(Vec::new())),
            }),
        }
    }

    /// Whether the parent future has been bound.
    pub fn is_bound(&self) -> bool {
        self.inner.parent.is_bound()
    }

    /// Bind the parent future and forward any held listeners to it.
    ///
    /// Returns `false` and leaves the existing binding in place if a parent
    /// was already bound.
    pub fn bind(&self, parent: FutureHandle<T>) -> bool
    where
        T: TaskResult,
    {
        self.bind_detached(parent).map(|forward| forward()).is_some()
    }

    /// Bind the parent but leave held listeners in place; the returned job
    /// forwards them. `None` if a parent was already bound.
    ///
    /// Listeners subscribed between the bind and the job are forwarded by
    /// the job as well.
    pub(crate) fn bind_detached(&self, parent: FutureHandle<T>) -> Option<Job>
    where
        T: TaskResult,
    {
        self.inner.parent.bind(Arc::clone(&parent)).ok()?;
        let inner = Arc::clone(&self.inner);
        Some(Box::new(move || {
            let held = inner.early.lock().take().unwrap_or_default();
            for (listener, executor) in held {
                parent.add_listener(listener, executor);
            }
        }))
    }

    /// The parent future, if bound.
    pub fn parent(&self) -> Option<FutureHandle<T>> {
        self.inner.parent.get()
    }

    /// Register a listener without blocking, even while unbound.
    pub fn subscribe(&self, listener: Listener, executor: Option<Arc<dyn Executor>>) {
        {
            let mut early = self.inner.early.lock();
            if let Some(held) = early.as_mut() {
                held.push((listener, executor));
                return;
            }
        }
        // `early` is emptied only after the parent is bound.
        if let Some(parent) = self.parent() {
            parent.add_listener(listener, executor);
        }
    }

    fn wait_parent(&self) -> FutureHandle<T> {
        self.inner.parent.wait()
    }
}

impl<T: TaskResult> ListenableFuture<T> for DeferredFuture<T> {
    fn add_listener(&self, listener: Listener, executor: Option<Arc<dyn Executor>>) {
        self.wait_parent().add_listener(listener, executor);
    }

    fn get(&self) -> Result<T, TaskError> {
        self.wait_parent().get()
    }

    fn get_timeout(&self, timeout: Duration) -> Result<T, TaskError> {
        let deadline = Instant::now() + timeout;
        let parent = self
            .inner
            .parent
            .wait_timeout(timeout)
            .ok_or(TaskError::Timeout)?;
        parent.get_timeout(deadline.saturating_duration_since(Instant::now()))
    }

    fn is_done(&self) -> bool {
        self.parent().is_some_and(|parent| parent.is_done())
    }

    fn cancel(&self) -> bool {
        self.parent().is_some_and(|parent| parent.cancel())
    }

    fn is_cancelled(&self) -> bool {
        self.parent().is_some_and(|parent| parent.is_cancelled())
    }
}
