//! Integration error types.

use eau3f_core::{CoreError, UpdateFailed};
use eau3f_fetch::FetchError;
use thiserror::Error;

/// Errors raised by a config flow outside of its form error slots.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A step was called in the wrong order.
    #[error("Unexpected step: {0}")]
    UnexpectedStep(&'static str),

    /// The API client could not be created.
    #[error("Client error: {0}")]
    Client(#[from] FetchError),

    /// Applying the result to the entry store failed.
    #[error("Store error: {0}")]
    Store(#[from] CoreError),
}

/// Errors raised while setting up a config entry.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The first refresh failed; setup should be retried later.
    #[error("Setup not ready: {0}")]
    NotReady(UpdateFailed),

    /// The stored session is no longer accepted and 2FA is needed.
    #[error("Re-authentication required")]
    ReauthRequired,

    /// The API client could not be created.
    #[error("Client error: {0}")]
    Client(#[from] FetchError),

    /// The entry store failed.
    #[error("Store error: {0}")]
    Store(#[from] CoreError),
}

impl SetupError {
    /// Returns true if a later attempt might succeed without user action.
    pub fn is_transient(&self) -> bool {
        matches!(self, SetupError::NotReady(_))
    }
}

impl From<UpdateFailed> for SetupError {
    fn from(err: UpdateFailed) -> Self {
        if err.needs_reauth() {
            SetupError::ReauthRequired
        } else {
            SetupError::NotReady(err)
        }
    }
}
