use thiserror::Error;

use keeper_store::StoreError;
use keeper_types::TypeError;
use keeper_utils::RetryExhausted;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("keeper {0} is not verified")]
    KeeperNotVerified(String),

    #[error("store write error: {0}")]
    StoreWrite(#[from] RetryExhausted<StoreError>),

    #[error("store read error: {0}")]
    StoreRead(#[source] StoreError),

    #[error(transparent)]
    InvalidAddress(#[from] TypeError),

    #[error("payload sealing failed: {0}")]
    Seal(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the failure was caused by the caller's request rather than by
    /// the engine or its collaborators. Transports map these to a rejection
    /// instead of a server error.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::KeeperNotVerified(_) | Self::InvalidAddress(_))
    }
}
