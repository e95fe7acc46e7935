//! Builders to construct limiters from code or configuration.

pub mod limiter_builder;

#[cfg(feature = "tokio-runtime")]
pub use limiter_builder::build_from_json;
pub use limiter_builder::{build_limiters, LimiterBuilder};
