//! Core error types for `eau3f`.

use thiserror::Error;

/// Core error type for `eau3f` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Config entry not found.
    #[error("Config entry not found: {0}")]
    EntryNotFound(String),

    /// An entry with the same unique id is already stored.
    #[error("Already configured: {0}")]
    AlreadyConfigured(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Entry storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Publishing to the sensor sink failed.
    #[error("Sink error: {0}")]
    Sink(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure surfaced by a polling fetch.
///
/// The coordinator turns this into entity unavailability; the next tick
/// retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateFailed {
    /// The silent re-login was answered with a 2FA challenge.
    #[error("Re-login required 2FA interaction")]
    ReauthRequired,

    /// Any other API or transport failure.
    #[error("API Error: {0}")]
    Api(String),
}

impl UpdateFailed {
    /// Returns true if the user has to re-authenticate interactively.
    pub fn needs_reauth(&self) -> bool {
        matches!(self, UpdateFailed::ReauthRequired)
    }
}
