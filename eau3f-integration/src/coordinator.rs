//! Polling coordinator.
//!
//! [`UpdateCoordinator`] calls a [`ReadingSource`] on a fixed interval and
//! keeps the latest outcome in a watch channel. [`ReauthenticatingSource`]
//! is the production source: it fetches with the stored session and, on
//! failure, logs in once more before giving up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eau3f_core::{ConfigEntry, EntryData, EntryStore, Reading, ReadingSource, Session, UpdateFailed};
use eau3f_fetch::{FetchError, Groupe3fApi, LoginStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, instrument, warn};

// ============================================================================
// Reauthenticating Source
// ============================================================================

/// Fetches readings for one config entry, re-logging in silently once when
/// the stored token is refused.
pub struct ReauthenticatingSource {
    api: Groupe3fApi,
    entries: Arc<dyn EntryStore>,
    entry_id: String,
}

impl ReauthenticatingSource {
    /// Creates a source from an API client already bound to the entry's
    /// trusted id.
    pub fn new(api: Groupe3fApi, entries: Arc<dyn EntryStore>, entry_id: impl Into<String>) -> Self {
        Self {
            api,
            entries,
            entry_id: entry_id.into(),
        }
    }

    /// Creates a source for an entry, restoring its trusted id.
    ///
    /// # Errors
    ///
    /// Returns error if the API client cannot be built.
    pub fn from_entry(
        base_url: &str,
        entries: Arc<dyn EntryStore>,
        entry: &ConfigEntry,
    ) -> Result<Self, FetchError> {
        let api = Groupe3fApi::with_base_url(base_url)?.with_trusted_id(entry.data.trusted_id.clone());
        Ok(Self::new(api, entries, entry.entry_id.clone()))
    }

    /// Reads the current entry data, so a token saved by a previous
    /// re-login is picked up.
    async fn current_data(&self) -> Result<EntryData, UpdateFailed> {
        self.entries
            .get(&self.entry_id)
            .await
            .map(|entry| entry.data)
            .ok_or_else(|| UpdateFailed::Api(format!("Config entry not found: {}", self.entry_id)))
    }

    async fn relogin(&self, data: &EntryData) -> Result<Session, UpdateFailed> {
        match self.api.login(&data.username, &data.password).await {
            Ok(LoginStatus::Success { token }) => Ok(self.api.session(token)),
            Ok(LoginStatus::TwoFactorRequired) => Err(UpdateFailed::ReauthRequired),
            Ok(LoginStatus::Error { message }) => Err(UpdateFailed::Api(message)),
            Err(e) => Err(UpdateFailed::Api(e.to_string())),
        }
    }
}

#[async_trait]
impl ReadingSource for ReauthenticatingSource {
    #[instrument(skip(self), fields(entry_id = %self.entry_id))]
    async fn fetch(&self) -> Result<Vec<Reading>, UpdateFailed> {
        let data = self.current_data().await?;

        match self
            .api
            .get_water_consumption(&data.session(), &data.contract_id)
            .await
        {
            Ok(readings) => return Ok(readings),
            Err(e) => debug!(
                error = %e,
                transient = e.is_transient(),
                "Fetch failed, attempting silent re-login"
            ),
        }

        let session = self.relogin(&data).await?;
        info!("Silent re-login succeeded");

        self.entries
            .update_data(&self.entry_id, data.with_session(&session))
            .await
            .map_err(|e| UpdateFailed::Api(e.to_string()))?;

        self.api
            .get_water_consumption(&session, &data.contract_id)
            .await
            .map_err(|e| UpdateFailed::Api(e.to_string()))
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Latest outcome of the coordinator.
///
/// `readings` keeps the last successful list when a later update fails.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    /// Last successfully fetched readings.
    pub readings: Vec<Reading>,
    /// Whether the last update succeeded.
    pub last_update_success: bool,
    /// Error of the last update, if it failed.
    pub last_error: Option<UpdateFailed>,
    /// Time of the last update attempt.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Periodic polling coordinator.
pub struct UpdateCoordinator {
    name: String,
    source: Arc<dyn ReadingSource>,
    update_interval: Duration,
    state: watch::Sender<CoordinatorState>,
    refresh_lock: Mutex<()>,
}

impl UpdateCoordinator {
    /// Creates a coordinator. Nothing is fetched until the first refresh.
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn ReadingSource>,
        update_interval: Duration,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            name: name.into(),
            source,
            update_interval,
            state,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns the coordinator name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Performs the refresh that gates setup.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the caller treats it as "not ready".
    pub async fn first_refresh(&self) -> Result<(), UpdateFailed> {
        debug!(name = %self.name, "First refresh");
        self.refresh().await
    }

    /// Fetches once and publishes the outcome.
    ///
    /// Concurrent calls are serialized.
    ///
    /// # Errors
    ///
    /// Returns the fetch error after recording it.
    pub async fn refresh(&self) -> Result<(), UpdateFailed> {
        let _guard = self.refresh_lock.lock().await;
        let result = self.source.fetch().await;
        let now = Utc::now();

        match result {
            Ok(readings) => {
                debug!(name = %self.name, count = readings.len(), "Update succeeded");
                self.state.send_modify(|state| {
                    state.readings = readings;
                    state.last_update_success = true;
                    state.last_error = None;
                    state.last_updated = Some(now);
                });
                Ok(())
            }
            Err(e) => {
                warn!(name = %self.name, error = %e, "Update failed");
                self.state.send_modify(|state| {
                    state.last_update_success = false;
                    state.last_error = Some(e.clone());
                    state.last_updated = Some(now);
                });
                Err(e)
            }
        }
    }

    /// Subscribes to outcomes.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Returns a copy of the latest outcome.
    pub fn snapshot(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    /// Returns the last successfully fetched readings.
    pub fn data(&self) -> Vec<Reading> {
        self.state.borrow().readings.clone()
    }

    /// Returns whether the last update succeeded.
    pub fn last_update_success(&self) -> bool {
        self.state.borrow().last_update_success
    }

    /// Polls until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// The first poll happens one interval after the call.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.update_interval, self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            name = %self.name,
            interval_secs = self.update_interval.as_secs(),
            "Polling started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Failures are recorded in the state channel.
                    let _ = self.refresh().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(name = %self.name, "Polling stopped");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSource {
        calls: AtomicUsize,
        fail_from: usize,
    }

    #[async_trait]
    impl ReadingSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<Reading>, UpdateFailed> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_from {
                return Err(UpdateFailed::Api("down".to_string()));
            }
            Ok(vec![Reading {
                cold: true,
                index_m3: Some(call as f64),
                ..Reading::default()
            }])
        }
    }

    fn coordinator(fail_from: usize, interval: Duration) -> (Arc<UpdateCoordinator>, Arc<ScriptedSource>) {
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            fail_from,
        });
        let coordinator = Arc::new(UpdateCoordinator::new(
            "groupe3f",
            Arc::clone(&source) as Arc<dyn ReadingSource>,
            interval,
        ));
        (coordinator, source)
    }

    #[tokio::test]
    async fn test_failure_keeps_last_data() {
        let (coordinator, _) = coordinator(1, Duration::from_secs(60));
        assert!(!coordinator.last_update_success());

        coordinator.first_refresh().await.unwrap();
        assert!(coordinator.last_update_success());
        assert_eq!(coordinator.data().len(), 1);

        let err = coordinator.refresh().await.unwrap_err();
        assert_eq!(err, UpdateFailed::Api("down".to_string()));

        let snapshot = coordinator.snapshot();
        assert!(!snapshot.last_update_success);
        assert_eq!(snapshot.readings.len(), 1);
        assert_eq!(snapshot.last_error, Some(UpdateFailed::Api("down".to_string())));
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let (coordinator, _) = coordinator(10, Duration::from_secs(60));
        let mut rx = coordinator.subscribe();

        coordinator.refresh().await.unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow().last_update_success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_until_shutdown() {
        let (coordinator, source) = coordinator(10, Duration::from_secs(43_200));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.run(shutdown_rx).await })
        };

        tokio::time::sleep(Duration::from_secs(43_200 * 2 + 1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
