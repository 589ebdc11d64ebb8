//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! All external collaborators (clock, durable store, uptime cache,
//! notification channel) are abstracted behind traits. This crate provides
//! in-memory implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically, including injected failures
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests and in the dev daemon.

pub mod cache;
pub mod clock;
pub mod notifier;
pub mod repository;

pub use cache::NullUptimeCache;
pub use clock::NullClock;
pub use notifier::NullNotifier;
pub use repository::NullKeeperRepository;
