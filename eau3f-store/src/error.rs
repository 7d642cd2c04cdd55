//! Store error types.

use eau3f_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Config entry not found.
    #[error("Config entry not found: {0}")]
    EntryNotFound(String),

    /// An entry with the same unique id exists.
    #[error("Already configured: {0}")]
    AlreadyConfigured(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EntryNotFound(id) => CoreError::EntryNotFound(id),
            StoreError::AlreadyConfigured(id) => CoreError::AlreadyConfigured(id),
            StoreError::Config(msg) => CoreError::InvalidConfig(msg),
            StoreError::Serialization(e) => CoreError::Serialization(e),
            StoreError::Io(e) => CoreError::Storage(e.to_string()),
        }
    }
}
