//! CLI command implementations.

pub mod config;
pub mod entries;
mod flow;
pub mod readings;
pub mod reauth;
pub mod run;
pub mod setup;

use anyhow::{Context, Result, anyhow, bail};
use eau3f_core::{ConfigEntry, EntryStore};
use eau3f_store::{JsonEntryStore, Settings, SettingsStore};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

/// Environment variable read instead of prompting for the account password.
pub const PASSWORD_ENV: &str = "EAU3F_PASSWORD";

// ============================================================================
// Stores
// ============================================================================

/// Settings and config entries loaded from the config directory.
pub(crate) struct Stores {
    pub settings: SettingsStore,
    pub entries: Arc<JsonEntryStore>,
}

impl Stores {
    /// Loads both stores from their default paths.
    pub async fn load() -> Result<Self> {
        let settings = SettingsStore::load_default()
            .await
            .context("Failed to load settings")?;
        let entries = JsonEntryStore::load_default()
            .await
            .context("Failed to load config entries")?;

        Ok(Self {
            settings,
            entries: Arc::new(entries),
        })
    }

    /// Returns the entry store as the integration sees it.
    pub fn entry_store(&self) -> Arc<dyn EntryStore> {
        Arc::clone(&self.entries) as Arc<dyn EntryStore>
    }

    /// Returns the settings with environment overrides applied.
    pub async fn effective_settings(&self) -> Settings {
        self.settings.effective().await
    }
}

/// Finds an entry by entry id, contract id or title.
pub(crate) async fn resolve_entry(entries: &dyn EntryStore, key: &str) -> Result<ConfigEntry> {
    entries
        .entries()
        .await
        .into_iter()
        .find(|entry| {
            entry.entry_id == key
                || entry.unique_id.as_deref() == Some(key)
                || entry.title.eq_ignore_ascii_case(key)
        })
        .ok_or_else(|| anyhow!("No entry matches '{key}' (see `eau3f entries`)"))
}

/// Returns the entry named by `key`, or every entry.
pub(crate) async fn select_entries(
    entries: &dyn EntryStore,
    key: Option<&str>,
) -> Result<Vec<ConfigEntry>> {
    if let Some(key) = key {
        return Ok(vec![resolve_entry(entries, key).await?]);
    }

    let all = entries.entries().await;
    if all.is_empty() {
        bail!("No account configured. Run `eau3f setup` first.");
    }
    Ok(all)
}

// ============================================================================
// Prompts
// ============================================================================

/// Reads answers line by line from stdin. Questions go to stderr.
pub(crate) struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    /// Creates a prompter on the process stdin.
    pub fn stdin() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Asks one question and returns the trimmed answer.
    pub async fn ask(&mut self, label: &str) -> Result<String> {
        let mut stderr = tokio::io::stderr();
        stderr.write_all(format!("{label}: ").as_bytes()).await?;
        stderr.flush().await?;

        let line = self
            .lines
            .next_line()
            .await?
            .ok_or_else(|| anyhow!("Input closed while waiting for {label}"))?;
        Ok(line.trim().to_string())
    }

    /// Returns the password from [`PASSWORD_ENV`], or asks for it.
    pub async fn password(&mut self) -> Result<String> {
        match std::env::var(PASSWORD_ENV) {
            Ok(password) if !password.is_empty() => Ok(password),
            _ => self.ask("Password").await,
        }
    }
}
