//! Trait definitions for eau3f.
//!
//! The integration is composed from three capabilities: a source of
//! readings, a sink for sensor states and statistics, and a store for config
//! entries.

use async_trait::async_trait;

use crate::error::{CoreError, UpdateFailed};
use crate::models::{
    ConfigEntry, EntryData, EntryState, Reading, SensorState, StatisticMetadata, StatisticPoint,
};

/// Something that can produce the current reading list.
///
/// Implementors are responsible for:
/// - Authenticating with the vendor API
/// - Recovering from an expired token when they can
/// - Returning the raw readings unchanged
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Fetches the current reading list.
    async fn fetch(&self) -> Result<Vec<Reading>, UpdateFailed>;
}

/// Destination for sensor states and long-term statistics.
#[async_trait]
pub trait SensorSink: Send + Sync {
    /// Publishes the current state of one entity.
    async fn publish_state(&self, state: &SensorState) -> Result<(), CoreError>;

    /// Imports a time-ordered statistics series.
    async fn import_statistics(
        &self,
        metadata: &StatisticMetadata,
        points: &[StatisticPoint],
    ) -> Result<(), CoreError>;
}

/// Persistent store of config entries.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Returns all entries.
    async fn entries(&self) -> Vec<ConfigEntry>;

    /// Returns one entry by id.
    async fn get(&self, entry_id: &str) -> Option<ConfigEntry>;

    /// Returns the entry with the given unique id.
    async fn find_by_unique_id(&self, unique_id: &str) -> Option<ConfigEntry> {
        self.entries()
            .await
            .into_iter()
            .find(|e| e.unique_id.as_deref() == Some(unique_id))
    }

    /// Adds a new entry.
    ///
    /// Fails with [`CoreError::AlreadyConfigured`] when the unique id is taken.
    async fn add(&self, entry: ConfigEntry) -> Result<(), CoreError>;

    /// Replaces the data of an entry in place.
    async fn update_data(&self, entry_id: &str, data: EntryData) -> Result<(), CoreError>;

    /// Records the lifecycle state of an entry.
    async fn set_state(&self, entry_id: &str, state: EntryState) -> Result<(), CoreError>;

    /// Removes an entry, returning it if it existed.
    async fn remove(&self, entry_id: &str) -> Result<Option<ConfigEntry>, CoreError>;
}
