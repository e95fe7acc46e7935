//! Serializable scheduling primitives shared across the crate.

use serde::{Deserialize, Serialize};

/// Identifier assigned to every submission passing through a limiter.
pub type TaskId = u64;

/// Priority understood by the underlying scheduler.
///
/// Ordering follows urgency, so `Priority::High > Priority::Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background work that yields to high priority tasks.
    Low,
    /// Latency sensitive work, run ahead of low priority tasks.
    High,
}

impl Priority {
    /// Short lowercase label used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
