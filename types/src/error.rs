//! Error type for value-level validation.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid keeper address: {0:?}")]
    InvalidAddress(String),
}
