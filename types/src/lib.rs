//! Fundamental types for the keeper liveness and rewards engine.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! keeper addresses, keeper records, check-in payloads, and the clock abstraction.

pub mod address;
pub mod checkin;
pub mod error;
pub mod keeper;
pub mod time;

pub use address::KeeperAddress;
pub use checkin::{CheckIn, CheckInResponse};
pub use error::TypeError;
pub use keeper::{KeeperRecord, KeeperStatusUpdate};
pub use time::{Clock, SystemClock};
