//! Single-assignment binding primitive.
//!
//! [`BindCell`] holds a value that is assigned at most once and may be awaited
//! by any number of threads before that happens. It is the synchronization
//! point behind [`DeferredFuture`](crate::future::DeferredFuture): callers can
//! block on a future whose producing task has not been admitted yet.
//!
//! # Examples
//!
//! ```
//! use prometheus_priority_limiter::BindCell;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let cell = Arc::new(BindCell::new());
//! let waiter = {
//!     let cell = Arc::clone(&cell);
//!     thread::spawn(move || cell.wait())
//! };
//!
//! assert!(cell.bind(7).is_ok());
//! assert_eq!(waiter.join().unwrap(), 7);
//! assert_eq!(cell.bind(8), Err(8));
//! ```

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A cell that is bound exactly once and supports blocking reads.
///
/// Waiting uses a condition variable; there is no spinning.
#[derive(Debug)]
pub struct BindCell<V> {
    slot: Mutex<Option<V>>,
    bound: Condvar,
}

impl<V> BindCell<V> {
    /// Creates an unbound cell.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            bound: Condvar::new(),
        }
    }

    /// Binds the cell, waking every waiter.
    ///
    /// # Errors
    ///
    /// Returns the rejected value if the cell was already bound.
    pub fn bind(&self, value: V) -> Result<(), V> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(value);
        }
        *slot = Some(value);
        drop(slot);
        self.bound.notify_all();
        Ok(())
    }

    /// Whether a value has been bound.
    pub fn is_bound(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<V> Default for BindCell<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> BindCell<V> {
    /// Returns the bound value without blocking.
    pub fn get(&self) -> Option<V> {
        self.slot.lock().clone()
    }

    /// Blocks until the cell is bound and returns the value.
    pub fn wait(&self) -> V {
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            self.bound.wait(&mut slot);
        }
    }

    /// Blocks until the cell is bound or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<V> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return Some(value.clone());
            }
            if self.bound.wait_until(&mut slot, deadline).timed_out() {
                return slot.clone();
            }
        }
    }
}
