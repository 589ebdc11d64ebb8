//! Time source used throughout the engine.
//!
//! Every "now" read goes through a [`Clock`] so that liveness timeouts and the
//! daily distribution schedule can be driven deterministically in tests.

use chrono::{DateTime, Utc};

/// A source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
