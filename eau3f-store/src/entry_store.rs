//! Config entry store.
//!
//! Keeps every installed bridge instance in one JSON file. Token refreshes
//! update entries in place. A change reaches memory only once it is on disk.

use async_trait::async_trait;
use eau3f_core::{ConfigEntry, CoreError, EntryData, EntryState, EntryStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{default_entries_path, load_json, save_json};

/// Current file format version.
const FILE_VERSION: u32 = 1;

/// On-disk layout of the entries file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct EntriesFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: Vec<ConfigEntry>,
}

// ============================================================================
// JSON Entry Store
// ============================================================================

/// Config entry store backed by a JSON file.
///
/// Lifecycle state is kept in memory as well as on disk, so a freshly
/// loaded store reports the state of the last run.
pub struct JsonEntryStore {
    entries: Arc<RwLock<Vec<ConfigEntry>>>,
    path: Option<PathBuf>,
}

impl JsonEntryStore {
    /// Creates a store that never touches disk.
    pub fn in_memory() -> Self {
        Self::with_entries(None, Vec::new())
    }

    fn with_entries(path: Option<PathBuf>, entries: Vec<ConfigEntry>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(entries)),
            path,
        }
    }

    /// Loads entries from the default path.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load_default() -> Result<Self, StoreError> {
        Self::load(default_entries_path()).await
    }

    /// Loads entries from a path. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let entries = if path.exists() {
            info!(path = %path.display(), "Loading config entries");
            let file: EntriesFile = load_json(&path).await?;
            if file.version > FILE_VERSION {
                warn!(version = file.version, "Entries file is newer than this build");
            }
            file.entries
        } else {
            debug!(path = %path.display(), "Entries file not found, starting empty");
            Vec::new()
        };

        Ok(Self::with_entries(Some(path), entries))
    }

    /// Returns the backing file path, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, entries: &[ConfigEntry]) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = EntriesFile {
            version: FILE_VERSION,
            entries: entries.to_vec(),
        };
        save_json(path, &file).await
    }

    /// Applies a change to one entry on a copy, persists the copy, then
    /// commits it.
    async fn modify<F>(&self, entry_id: &str, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ConfigEntry),
    {
        let mut entries = self.entries.write().await;
        let mut next = entries.clone();
        let entry = next
            .iter_mut()
            .find(|e| e.entry_id == entry_id)
            .ok_or_else(|| StoreError::EntryNotFound(entry_id.to_string()))?;
        f(entry);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    /// Adds an entry, rejecting duplicate unique ids.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyConfigured`] on a duplicate, or an IO
    /// error if the file cannot be written.
    pub async fn insert(&self, entry: ConfigEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        if let Some(unique_id) = &entry.unique_id {
            if entries
                .iter()
                .any(|e| e.unique_id.as_ref() == Some(unique_id))
            {
                return Err(StoreError::AlreadyConfigured(unique_id.clone()));
            }
        }
        info!(entry_id = %entry.entry_id, title = %entry.title, "Adding config entry");
        let mut next = entries.clone();
        next.push(entry);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    /// Replaces the data of an entry.
    ///
    /// # Errors
    ///
    /// Returns error if the entry does not exist or the file cannot be written.
    pub async fn replace_data(&self, entry_id: &str, data: EntryData) -> Result<(), StoreError> {
        debug!(entry_id = %entry_id, "Updating entry data");
        self.modify(entry_id, |e| e.data = data).await
    }

    /// Records an entry's lifecycle state.
    ///
    /// # Errors
    ///
    /// Returns error if the entry does not exist or the file cannot be written.
    pub async fn record_state(&self, entry_id: &str, state: EntryState) -> Result<(), StoreError> {
        debug!(entry_id = %entry_id, state = %state, "Updating entry state");
        self.modify(entry_id, |e| e.state = state).await
    }

    /// Removes an entry.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub async fn delete(&self, entry_id: &str) -> Result<Option<ConfigEntry>, StoreError> {
        let mut entries = self.entries.write().await;
        let Some(index) = entries.iter().position(|e| e.entry_id == entry_id) else {
            return Ok(None);
        };
        let mut next = entries.clone();
        let removed = next.remove(index);
        self.persist(&next).await?;
        *entries = next;

        info!(entry_id = %entry_id, "Removed config entry");
        Ok(Some(removed))
    }
}

#[async_trait]
impl EntryStore for JsonEntryStore {
    async fn entries(&self) -> Vec<ConfigEntry> {
        self.entries.read().await.clone()
    }

    async fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.entry_id == entry_id)
            .cloned()
    }

    async fn add(&self, entry: ConfigEntry) -> Result<(), CoreError> {
        Ok(self.insert(entry).await?)
    }

    async fn update_data(&self, entry_id: &str, data: EntryData) -> Result<(), CoreError> {
        Ok(self.replace_data(entry_id, data).await?)
    }

    async fn set_state(&self, entry_id: &str, state: EntryState) -> Result<(), CoreError> {
        Ok(self.record_state(entry_id, state).await?)
    }

    async fn remove(&self, entry_id: &str) -> Result<Option<ConfigEntry>, CoreError> {
        Ok(self.delete(entry_id).await?)
    }
}

// ============================================================================
// Tests
// ============================================================================
