//! Config entry types.
//!
//! A config entry is one installed bridge instance, keyed by contract id:
//! - [`EntryData`] - Credentials and options persisted with the entry
//! - [`ConfigEntry`] - The stored record
//! - [`EntryState`] - Lifecycle state
//! - [`Session`] - Immutable token snapshot handed to each fetch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Integration domain name.
pub const DOMAIN: &str = "groupe3f";

/// Current entry schema version.
pub const ENTRY_VERSION: u32 = 1;

// ============================================================================
// Entry Data
// ============================================================================

/// Credentials and options stored with a config entry.
///
/// Token and trusted id change on re-login; everything else is fixed after
/// setup.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryData {
    /// Account e-mail used to log in.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Resolved contract id.
    pub contract_id: String,
    /// Bearer token from the last successful login.
    pub token: String,
    /// Trusted-device id sent with every login.
    pub trusted_id: String,
    /// Optional unit price, 0.0 when unset.
    #[serde(default)]
    pub price_per_m3: f64,
}

impl EntryData {
    /// Returns the token snapshot for this entry.
    pub fn session(&self) -> Session {
        Session::new(self.token.clone(), self.trusted_id.clone())
    }

    /// Returns a copy carrying a refreshed session.
    ///
    /// Only token and trusted id change.
    pub fn with_session(&self, session: &Session) -> Self {
        Self {
            token: session.token.clone(),
            trusted_id: session.trusted_id.clone(),
            ..self.clone()
        }
    }

    /// Returns the configured price, if any.
    pub fn price(&self) -> Option<f64> {
        (self.price_per_m3 > 0.0).then_some(self.price_per_m3)
    }
}

impl std::fmt::Debug for EntryData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryData")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("contract_id", &self.contract_id)
            .field("token", &"<redacted>")
            .field("trusted_id", &self.trusted_id)
            .field("price_per_m3", &self.price_per_m3)
            .finish()
    }
}

// ============================================================================
// Session
// ============================================================================

/// Token snapshot used for one fetch.
///
/// Never mutated; a re-login yields a new value.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Bearer token.
    pub token: String,
    /// Trusted-device id.
    pub trusted_id: String,
}

impl Session {
    /// Creates a new session snapshot.
    pub fn new(token: impl Into<String>, trusted_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            trusted_id: trusted_id.into(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("trusted_id", &self.trusted_id)
            .finish()
    }
}

// ============================================================================
// Config Entry
// ============================================================================

/// Lifecycle state of a config entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Not set up in this process.
    #[default]
    NotLoaded,
    /// Set up and polling.
    Loaded,
    /// First refresh failed; setup will be retried.
    SetupRetry,
    /// Setup failed permanently.
    SetupError,
    /// The stored credentials need an interactive re-login.
    NeedsReauth,
}

impl std::fmt::Display for EntryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryState::NotLoaded => write!(f, "not_loaded"),
            EntryState::Loaded => write!(f, "loaded"),
            EntryState::SetupRetry => write!(f, "setup_retry"),
            EntryState::SetupError => write!(f, "setup_error"),
            EntryState::NeedsReauth => write!(f, "needs_reauth"),
        }
    }
}

/// A stored config entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Random entry id.
    pub entry_id: String,
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Integration domain.
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Display title, e.g. `Contrat 123`.
    pub title: String,
    /// Deduplication key (the contract id).
    pub unique_id: Option<String>,
    /// Credentials and options.
    pub data: EntryData,
    /// Lifecycle state.
    #[serde(default)]
    pub state: EntryState,
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    ENTRY_VERSION
}

fn default_domain() -> String {
    DOMAIN.to_string()
}

impl ConfigEntry {
    /// Creates a new entry with a fresh id.
    pub fn new(title: impl Into<String>, unique_id: Option<String>, data: EntryData) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().simple().to_string(),
            version: ENTRY_VERSION,
            domain: DOMAIN.to_string(),
            title: title.into(),
            unique_id,
            data,
            state: EntryState::NotLoaded,
            created_at: Utc::now(),
        }
    }

    /// Title used for a contract.
    pub fn title_for_contract(contract_id: &str) -> String {
        format!("Contrat {contract_id}")
    }
}

// ============================================================================
// Tests
// ============================================================================
