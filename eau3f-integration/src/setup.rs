//! Config entry setup and unload.
//!
//! Setting up an entry restores its session, performs the first refresh,
//! creates one sensor per detected meter, publishes their initial state and
//! statistics, and spawns the polling and publishing tasks.

use eau3f_core::{ConfigEntry, EntryState, EntryStore, ReadingSource, SensorSink};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::coordinator::{CoordinatorState, ReauthenticatingSource, UpdateCoordinator};
use crate::error::SetupError;
use crate::sensor::WaterSensor;

/// Shared dependencies of every loaded entry.
#[derive(Clone)]
pub struct SetupContext {
    /// Vendor API base URL.
    pub api_base_url: String,
    /// Config entry store.
    pub entries: Arc<dyn EntryStore>,
    /// Where sensor states and statistics go.
    pub sink: Arc<dyn SensorSink>,
    /// Polling interval.
    pub scan_interval: Duration,
}

/// Sets up an entry against the vendor API.
///
/// # Errors
///
/// Returns [`SetupError::NotReady`] if the first refresh fails,
/// [`SetupError::ReauthRequired`] if the session needs 2FA, or a store error.
pub async fn setup_entry(entry: &ConfigEntry, ctx: &SetupContext) -> Result<LoadedEntry, SetupError> {
    let source =
        ReauthenticatingSource::from_entry(&ctx.api_base_url, Arc::clone(&ctx.entries), entry)?;
    setup_entry_with_source(entry, Arc::new(source), ctx).await
}

/// Sets up an entry with a given reading source.
///
/// # Errors
///
/// Same as [`setup_entry`].
#[instrument(skip_all, fields(entry_id = %entry.entry_id))]
pub async fn setup_entry_with_source(
    entry: &ConfigEntry,
    source: Arc<dyn ReadingSource>,
    ctx: &SetupContext,
) -> Result<LoadedEntry, SetupError> {
    let coordinator = Arc::new(UpdateCoordinator::new(
        entry.title.clone(),
        source,
        ctx.scan_interval,
    ));

    if let Err(e) = coordinator.first_refresh().await {
        let state = if e.needs_reauth() {
            EntryState::NeedsReauth
        } else {
            EntryState::SetupRetry
        };
        warn!(error = %e, state = %state, "Setup failed");
        ctx.entries.set_state(&entry.entry_id, state).await?;
        return Err(e.into());
    }

    let snapshot = coordinator.snapshot();
    let sensors = WaterSensor::detect(&entry.data.contract_id, &snapshot.readings, entry.data.price());
    if sensors.is_empty() {
        info!("No meter found in readings");
    }
    join_all(
        sensors
            .iter()
            .map(|sensor| sensor.publish(ctx.sink.as_ref(), &snapshot)),
    )
    .await;

    ctx.entries
        .set_state(&entry.entry_id, EntryState::Loaded)
        .await?;
    info!(sensors = sensors.len(), "Entry loaded");

    let (shutdown, shutdown_rx) = watch::channel(false);
    let poller = {
        let coordinator = Arc::clone(&coordinator);
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { coordinator.run(shutdown_rx).await })
    };
    let publisher = tokio::spawn(publish_updates(
        coordinator.subscribe(),
        sensors.clone(),
        Arc::clone(&ctx.sink),
        Arc::clone(&ctx.entries),
        entry.entry_id.clone(),
        shutdown_rx,
    ));

    Ok(LoadedEntry {
        entry_id: entry.entry_id.clone(),
        coordinator,
        sensors,
        entries: Arc::clone(&ctx.entries),
        shutdown,
        tasks: vec![poller, publisher],
    })
}

/// Publishes every coordinator outcome and tracks the entry state.
async fn publish_updates(
    mut updates: watch::Receiver<CoordinatorState>,
    sensors: Vec<WaterSensor>,
    sink: Arc<dyn SensorSink>,
    entries: Arc<dyn EntryStore>,
    entry_id: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut current = EntryState::Loaded;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                join_all(sensors.iter().map(|sensor| sensor.publish(sink.as_ref(), &snapshot))).await;

                let next = match &snapshot.last_error {
                    Some(e) if e.needs_reauth() => EntryState::NeedsReauth,
                    _ => EntryState::Loaded,
                };
                if next != current {
                    debug!(entry_id = %entry_id, state = %next, "Entry state changed");
                    if let Err(e) = entries.set_state(&entry_id, next).await {
                        warn!(entry_id = %entry_id, error = %e, "Failed to record entry state");
                    }
                    current = next;
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

// ============================================================================
// Loaded Entry
// ============================================================================

/// Handle to a running entry.
pub struct LoadedEntry {
    entry_id: String,
    coordinator: Arc<UpdateCoordinator>,
    sensors: Vec<WaterSensor>,
    entries: Arc<dyn EntryStore>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl LoadedEntry {
    /// Returns the entry id.
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &Arc<UpdateCoordinator> {
        &self.coordinator
    }

    /// Returns the sensors created at setup.
    pub fn sensors(&self) -> &[WaterSensor] {
        &self.sensors
    }

    /// Stops polling and marks the entry as not loaded.
    ///
    /// # Errors
    ///
    /// Returns error if the entry state cannot be recorded.
    pub async fn unload(self) -> Result<(), SetupError> {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(entry_id = %self.entry_id, error = %e, "Entry task ended abnormally");
            }
        }

        match self
            .entries
            .set_state(&self.entry_id, EntryState::NotLoaded)
            .await
        {
            Ok(()) => {}
            // Unloading after removal is fine.
            Err(eau3f_core::CoreError::EntryNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(entry_id = %self.entry_id, "Entry unloaded");
        Ok(())
    }
}
