//! Collaborator contracts consumed by the keeper engine.
//!
//! The durable keeper store, the uptime cache and the notification channel
//! live outside the engine. Every backend (wide-column store, key-value cache,
//! in-memory for testing) implements these traits; the engine depends only on
//! the traits.
//!
//! Implementations are expected to bound every call with their own timeout so
//! that the engine's fixed retry count terminates promptly.

pub mod cache;
pub mod error;
pub mod notify;
pub mod repository;

pub use cache::UptimeCache;
pub use error::{NotifyError, StoreError};
pub use notify::Notifier;
pub use repository::KeeperRepository;
