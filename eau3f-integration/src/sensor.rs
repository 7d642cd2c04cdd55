//! Water meter sensor entities.
//!
//! A [`WaterSensor`] has no state of its own: every value is derived from
//! the coordinator's latest reading list when a state is built.

use eau3f_core::{
    DOMAIN, DeviceClass, DeviceInfo, MeterKind, Reading, STATE_UNAVAILABLE, STATE_UNKNOWN,
    SensorSink, SensorState, StateClass, StatisticMetadata, UNIT_CUBIC_METERS, build_statistics,
    detect_meters, latest_reading,
};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::coordinator::CoordinatorState;

/// Manufacturer shown on the device.
pub const MANUFACTURER: &str = "Groupe 3F";

/// Statistic source for entity-bound statistics.
const RECORDER_SOURCE: &str = "recorder";

/// One sensor per meter kind of a contract.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterSensor {
    contract_id: String,
    kind: MeterKind,
    price_per_m3: Option<f64>,
}

impl WaterSensor {
    /// Creates a sensor. A price of `None` disables the cost attribute.
    pub fn new(contract_id: impl Into<String>, kind: MeterKind, price_per_m3: Option<f64>) -> Self {
        Self {
            contract_id: contract_id.into(),
            kind,
            price_per_m3,
        }
    }

    /// Creates one sensor per meter kind present in the readings.
    pub fn detect(contract_id: &str, readings: &[Reading], price_per_m3: Option<f64>) -> Vec<Self> {
        detect_meters(readings)
            .into_iter()
            .map(|kind| Self::new(contract_id, kind, price_per_m3))
            .collect()
    }

    /// Returns the meter kind.
    pub fn kind(&self) -> MeterKind {
        self.kind
    }

    /// Returns the unique id, `{contract_id}_{flag_key}`.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.contract_id, self.kind.flag_key())
    }

    /// Returns the device name, e.g. `Compteur 3F (123)`.
    pub fn device_name(&self) -> String {
        format!("Compteur 3F ({})", self.contract_id)
    }

    /// Returns the friendly name, device name followed by the meter name.
    pub fn friendly_name(&self) -> String {
        format!("{} {}", self.device_name(), self.kind.display_name())
    }

    /// Returns the entity id, e.g. `sensor.compteur_3f_123_eau_froide`.
    pub fn entity_id(&self) -> String {
        format!("sensor.{}", slugify(&self.friendly_name()))
    }

    /// Returns the device the sensor belongs to.
    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: vec![(DOMAIN.to_string(), self.contract_id.clone())],
            name: self.device_name(),
            manufacturer: MANUFACTURER.to_string(),
        }
    }

    /// Returns the latest cumulative index.
    pub fn native_value(&self, readings: &[Reading]) -> Option<f64> {
        latest_reading(readings, self.kind).and_then(|r| r.index_m3)
    }

    /// Returns the reading attributes of the latest reading.
    ///
    /// Empty when the meter has no reading.
    pub fn extra_state_attributes(&self, readings: &[Reading]) -> Map<String, Value> {
        let mut attributes = Map::new();
        let Some(latest) = latest_reading(readings, self.kind) else {
            return attributes;
        };

        attributes.insert("last_reading".to_string(), json!(latest.date));
        attributes.insert("serial_number".to_string(), json!(latest.trimmed_serial()));
        attributes.insert("monthly_cons_m3".to_string(), json!(latest.monthly_m3));
        if let Some(price) = self.price_per_m3 {
            attributes.insert("price_per_m3".to_string(), json!(price));
        }
        attributes
    }

    fn base_attributes(&self) -> Map<String, Value> {
        let mut attributes = Map::new();
        attributes.insert("friendly_name".to_string(), json!(self.friendly_name()));
        attributes.insert("unit_of_measurement".to_string(), json!(UNIT_CUBIC_METERS));
        attributes.insert("device_class".to_string(), json!(DeviceClass::Water));
        attributes.insert("state_class".to_string(), json!(StateClass::TotalIncreasing));
        attributes
    }

    /// Builds the state to publish for a coordinator snapshot.
    ///
    /// A failed last update yields `unavailable`; no reading yields `unknown`.
    pub fn state(&self, snapshot: &CoordinatorState) -> SensorState {
        let mut attributes = self.base_attributes();

        let state = if snapshot.last_update_success {
            attributes.extend(self.extra_state_attributes(&snapshot.readings));
            self.native_value(&snapshot.readings)
                .map_or_else(|| STATE_UNKNOWN.to_string(), |v| v.to_string())
        } else {
            STATE_UNAVAILABLE.to_string()
        };

        SensorState {
            entity_id: self.entity_id(),
            unique_id: self.unique_id(),
            state,
            attributes,
        }
    }

    /// Returns the metadata of the statistic this sensor backfills.
    pub fn statistic_metadata(&self) -> StatisticMetadata {
        StatisticMetadata {
            statistic_id: self.entity_id(),
            source: RECORDER_SOURCE.to_string(),
            name: Some(self.friendly_name()),
            unit_of_measurement: UNIT_CUBIC_METERS.to_string(),
            has_mean: false,
            has_sum: true,
        }
    }

    /// Publishes the state and, after a successful update, replays the
    /// reading history into the statistics store.
    pub async fn publish(&self, sink: &dyn SensorSink, snapshot: &CoordinatorState) {
        let state = self.state(snapshot);
        debug!(entity_id = %state.entity_id, state = %state.state, "Publishing sensor");
        if let Err(e) = sink.publish_state(&state).await {
            warn!(entity_id = %state.entity_id, error = %e, "Failed to publish state");
        }

        if !snapshot.last_update_success {
            return;
        }

        let points = build_statistics(&snapshot.readings, self.kind);
        if points.is_empty() {
            return;
        }
        if let Err(e) = sink
            .import_statistics(&self.statistic_metadata(), &points)
            .await
        {
            warn!(entity_id = %state.entity_id, error = %e, "Failed to import statistics");
        }
    }
}

/// Lowercases and replaces every run of non-alphanumeric characters with `_`.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for c in value.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

// ============================================================================
// Tests
// ============================================================================
