// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # eau3f Store
//!
//! Persistence for the `eau3f` bridge.
//!
//! This crate provides:
//!
//! - **JsonEntryStore**: Config entries (credentials, tokens, lifecycle state)
//! - **SettingsStore**: Polling interval, API endpoint and Home Assistant connection
//! - **Persistence**: File I/O helpers for JSON data with restrictive permissions
//!
//! ## Usage
//!
//! ```ignore
//! use eau3f_core::EntryStore;
//! use eau3f_store::{JsonEntryStore, SettingsStore};
//!
//! let entries = JsonEntryStore::load_default().await?;
//! let settings = SettingsStore::load_default().await?;
//!
//! for entry in entries.entries().await {
//!     println!("{} ({})", entry.title, entry.state);
//! }
//! ```

pub mod entry_store;
pub mod error;
pub mod persistence;
pub mod settings;

pub use entry_store::JsonEntryStore;
pub use error::StoreError;
pub use persistence::{
    CONFIG_DIR_ENV, default_config_dir, default_entries_path, default_settings_path, load_json,
    load_json_or_default, save_json,
};
pub use settings::{
    DEFAULT_API_BASE_URL, DEFAULT_SCAN_INTERVAL_SECS, HA_BASE_URL_ENV, HA_TOKEN_ENV,
    HomeAssistantSettings, LogLevel, Settings, SettingsStore,
};
