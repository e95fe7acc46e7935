//! In-flight task accounting against a fixed ceiling.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::LimiterError;

/// Counts admitted tasks and refuses admission at the ceiling.
///
/// Lock-free; `0 <= active <= ceiling` holds at every instant.
#[derive(Debug)]
pub struct AdmissionCounter {
    active: AtomicUsize,
    ceiling: usize,
}

impl AdmissionCounter {
    /// Creates a counter admitting at most `ceiling` tasks.
    ///
    /// # Errors
    ///
    /// Returns `LimiterError::InvalidConcurrency` for a zero ceiling.
    pub fn new(ceiling: usize) -> Result<Self, LimiterError> {
        if ceiling == 0 {
            return Err(LimiterError::InvalidConcurrency);
        }
        Ok(Self {
            active: AtomicUsize::new(0),
            ceiling,
        })
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&self) -> bool {
        let mut current = self.active.load(Ordering::Acquire);
        loop {
            if current >= self.ceiling {
                return false;
            }
            match self.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Return a slot taken by [`try_acquire`](Self::try_acquire).
    ///
    /// # Panics
    ///
    /// Panics if no slot is held; that is an accounting bug, not a
    /// recoverable condition.
    pub fn release(&self) {
        let released = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        assert!(released.is_ok(), "admission slot released with no active tasks");
    }

    /// Slots currently held.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Configured ceiling.
    pub const fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.ceiling.saturating_sub(self.active())
    }
}
