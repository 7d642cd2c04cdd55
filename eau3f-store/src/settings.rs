//! Bridge settings store.
//!
//! Manages the polling interval, API endpoint, Home Assistant connection and
//! log level, with persistence and change notification.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json, save_json};

/// Default polling interval (12 hours).
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 43_200;

/// Default vendor API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api-eclient.groupe3f.fr";

/// Environment variable holding the Home Assistant URL.
pub const HA_BASE_URL_ENV: &str = "HA_BASE_URL";

/// Environment variable holding the Home Assistant access token.
pub const HA_TOKEN_ENV: &str = "HA_TOKEN";

// ============================================================================
// Settings Types
// ============================================================================

/// Bridge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between two polls of the vendor API.
    pub scan_interval_secs: u64,

    /// Vendor API base URL.
    pub api_base_url: String,

    /// Home Assistant connection.
    pub home_assistant: HomeAssistantSettings,

    /// Log level.
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            home_assistant: HomeAssistantSettings::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Settings {
    /// Returns the polling interval.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Applies `HA_BASE_URL` / `HA_TOKEN` when they are set.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(HA_BASE_URL_ENV).ok(),
            std::env::var(HA_TOKEN_ENV).ok(),
        )
    }

    fn with_overrides(mut self, url: Option<String>, token: Option<String>) -> Self {
        if let Some(url) = url.filter(|v| !v.trim().is_empty()) {
            debug!("Home Assistant URL taken from environment");
            self.home_assistant.url = Some(url);
        }
        if let Some(token) = token.filter(|v| !v.trim().is_empty()) {
            debug!("Home Assistant token taken from environment");
            self.home_assistant.token = Some(token);
        }
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] for a zero interval or a malformed URL.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.scan_interval_secs == 0 {
            return Err(StoreError::Config(
                "scan_interval_secs must be greater than zero".to_string(),
            ));
        }

        Url::parse(&self.api_base_url)
            .map_err(|e| StoreError::Config(format!("api_base_url: {e}")))?;

        if let Some(url) = &self.home_assistant.url {
            Url::parse(url).map_err(|e| StoreError::Config(format!("home_assistant.url: {e}")))?;
        }
        Ok(())
    }
}

/// Home Assistant connection settings.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAssistantSettings {
    /// Base URL, e.g. `http://homeassistant.local:8123`.
    pub url: Option<String>,

    /// Long-lived access token.
    pub token: Option<String>,
}

impl std::fmt::Debug for HomeAssistantSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantSettings")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Log level options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Error level logging.
    Error,
    /// Warning level logging.
    Warn,
    /// Info level logging.
    #[default]
    Info,
    /// Debug level logging.
    Debug,
    /// Trace level logging.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

// ============================================================================
// Settings Store
// ============================================================================

/// Settings store with persistence.
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
}

impl SettingsStore {
    /// Creates a store holding default settings.
    pub fn new(path: PathBuf) -> Self {
        Self::with_settings(path, Settings::default())
    }

    fn with_settings(path: PathBuf, settings: Settings) -> Self {
        Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
        }
    }

    /// Loads settings from the default path.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be loaded from disk.
    pub async fn load_default() -> Result<Self, StoreError> {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from a path. A missing or unreadable file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be loaded from disk.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let settings = if path.exists() {
            info!(path = %path.display(), "Loading settings");
            load_json(&path).await.unwrap_or_else(|e| {
                warn!(error = %e, "Failed to load settings, using defaults");
                Settings::default()
            })
        } else {
            debug!(path = %path.display(), "Settings file not found, using defaults");
            Settings::default()
        };

        Ok(Self::with_settings(path, settings))
    }

    /// Returns the settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets a copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Gets the current settings with environment overrides applied.
    pub async fn effective(&self) -> Settings {
        self.get().await.with_env_overrides()
    }

    /// Updates settings in memory. Call [`SettingsStore::save`] to persist.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.settings.write().await;
        f(&mut settings);
    }

    /// Saves settings to disk.
    ///
    /// # Errors
    ///
    /// Returns error if settings are invalid or cannot be written to disk.
    pub async fn save(&self) -> Result<(), StoreError> {
        let settings = self.settings.read().await;
        settings.validate()?;
        save_json(&self.path, &*settings).await?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Gets the polling interval.
    pub async fn scan_interval(&self) -> Duration {
        self.settings.read().await.scan_interval()
    }

    /// Sets the Home Assistant connection.
    pub async fn set_home_assistant(&self, url: Option<String>, token: Option<String>) {
        self.update(|s| {
            if url.is_some() {
                s.home_assistant.url = url;
            }
            if token.is_some() {
                s.home_assistant.token = token;
            }
        })
        .await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.scan_interval(), Duration::from_secs(12 * 60 * 60));
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert!(settings.home_assistant.url.is_none());
        assert_eq!(settings.log_level, LogLevel::Info);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"log_level": "debug"}"#).unwrap();
        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.scan_interval_secs, DEFAULT_SCAN_INTERVAL_SECS);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = Settings {
            scan_interval_secs: 0,
            ..Settings::default()
        };
        assert!(matches!(zero.validate(), Err(StoreError::Config(_))));

        let mut bad_url = Settings::default();
        bad_url.home_assistant.url = Some("not a url".to_string());
        assert!(matches!(bad_url.validate(), Err(StoreError::Config(_))));
    }

    #[test]
    fn test_overrides_skip_empty_values() {
        let mut base = Settings::default();
        base.home_assistant.token = Some("from-file".to_string());

        let merged = base.with_overrides(Some("http://ha:8123".to_string()), Some(String::new()));
        assert_eq!(merged.home_assistant.url.as_deref(), Some("http://ha:8123"));
        assert_eq!(merged.home_assistant.token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let ha = HomeAssistantSettings {
            url: None,
            token: Some("very-secret".to_string()),
        };
        let debug = format!("{ha:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone());
        store
            .set_home_assistant(Some("http://ha:8123".to_string()), Some("tok".to_string()))
            .await;
        store.update(|s| s.scan_interval_secs = 600).await;
        store.save().await.unwrap();

        let reloaded = SettingsStore::load(path).await.unwrap();
        let settings = reloaded.get().await;
        assert_eq!(settings.scan_interval_secs, 600);
        assert_eq!(settings.home_assistant.token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_save_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone());
        store.update(|s| s.scan_interval_secs = 0).await;
        assert!(store.save().await.is_err());
        assert!(!path.exists());
    }
}
