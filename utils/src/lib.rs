//! Shared utilities for the keeper engine.

pub mod retry;
pub mod time;

pub use retry::{retry_with_backoff, RetryExhausted, BACKOFF_STEP};
pub use time::{format_duration, to_std_duration};
