//! Sensor and statistics types.
//!
//! These are the payloads handed to a [`crate::SensorSink`]:
//! - [`SensorState`] - Current state plus attributes of one entity
//! - [`DeviceInfo`] - Device the entities are grouped under
//! - [`StatisticMetadata`] / [`StatisticPoint`] - Long-term statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// State published when no reading is available.
pub const STATE_UNKNOWN: &str = "unknown";

/// State published while the coordinator cannot fetch.
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Unit of every water sensor.
pub const UNIT_CUBIC_METERS: &str = "m³";

// ============================================================================
// Device
// ============================================================================

/// Sensor device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Water volume.
    Water,
}

/// Sensor state class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    /// Monotonic counter that may reset.
    TotalIncreasing,
}

/// Device grouping the sensors of one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `(domain, id)` identifier pairs.
    pub identifiers: Vec<(String, String)>,
    /// Device name.
    pub name: String,
    /// Manufacturer.
    pub manufacturer: String,
}

// ============================================================================
// Sensor State
// ============================================================================

/// Snapshot of one sensor entity, ready to publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    /// Entity id, e.g. `sensor.compteur_3f_123_eau_froide`.
    pub entity_id: String,
    /// Stable unique id, `{contract_id}_{flag_key}`.
    pub unique_id: String,
    /// State string (a number, `unknown` or `unavailable`).
    pub state: String,
    /// Extra state attributes.
    pub attributes: Map<String, Value>,
}

impl SensorState {
    /// Returns true if the state carries a value.
    pub fn is_available(&self) -> bool {
        self.state != STATE_UNAVAILABLE && self.state != STATE_UNKNOWN
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Metadata describing an imported statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticMetadata {
    /// Statistic id (the entity id for recorder-sourced statistics).
    pub statistic_id: String,
    /// Statistic source.
    pub source: String,
    /// Display name.
    pub name: Option<String>,
    /// Unit of measurement.
    pub unit_of_measurement: String,
    /// Whether a mean is tracked.
    pub has_mean: bool,
    /// Whether a cumulative sum is tracked.
    pub has_sum: bool,
}

/// One hourly statistic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatisticPoint {
    /// Start of the hour.
    pub start: DateTime<Utc>,
    /// State at that time.
    pub state: f64,
    /// Cumulative sum at that time.
    pub sum: f64,
}
