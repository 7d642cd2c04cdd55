//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use eau3f_core::{ConfigEntry, EntryState, SensorState, StatisticPoint, UpdateFailed, build_statistics};
use eau3f_integration::{CoordinatorState, WaterSensor};
use eau3f_store::Settings;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a config entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryOutput {
    pub entry_id: String,
    pub title: String,
    pub contract_id: String,
    pub username: String,
    pub state: EntryState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_m3: Option<f64>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime<Utc>,
}

impl From<&ConfigEntry> for EntryOutput {
    fn from(entry: &ConfigEntry) -> Self {
        Self {
            entry_id: entry.entry_id.clone(),
            title: entry.title.clone(),
            contract_id: entry.data.contract_id.clone(),
            username: entry.data.username.clone(),
            state: entry.state,
            price_per_m3: entry.data.price(),
            created_at: entry.created_at,
        }
    }
}

/// Readings of one entry as its sensors would publish them.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsOutput {
    pub entry_id: String,
    pub title: String,
    pub contract_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_datetime_opt")]
    pub updated_at: Option<DateTime<Utc>>,
    pub sensors: Vec<SensorOutput>,
    #[serde(skip)]
    pub failure: Option<UpdateFailed>,
}

impl ReadingsOutput {
    /// Builds the output from a coordinator snapshot.
    pub fn new(
        entry: &ConfigEntry,
        snapshot: &CoordinatorState,
        sensors: &[WaterSensor],
        with_history: bool,
    ) -> Self {
        let sensors = sensors
            .iter()
            .map(|sensor| {
                let statistics = (with_history && snapshot.last_update_success).then(|| {
                    build_statistics(&snapshot.readings, sensor.kind())
                        .iter()
                        .map(StatisticOutput::from)
                        .collect()
                });
                SensorOutput::new(sensor.friendly_name(), sensor.state(snapshot), statistics)
            })
            .collect();

        Self {
            entry_id: entry.entry_id.clone(),
            title: entry.title.clone(),
            contract_id: entry.data.contract_id.clone(),
            success: snapshot.last_update_success,
            error: snapshot.last_error.as_ref().map(ToString::to_string),
            updated_at: snapshot.last_updated,
            sensors,
            failure: snapshot.last_error.clone(),
        }
    }
}

/// One sensor entity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorOutput {
    pub entity_id: String,
    pub unique_id: String,
    pub name: String,
    pub state: String,
    pub attributes: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Vec<StatisticOutput>>,
}

impl SensorOutput {
    fn new(name: String, state: SensorState, statistics: Option<Vec<StatisticOutput>>) -> Self {
        Self {
            entity_id: state.entity_id,
            unique_id: state.unique_id,
            name,
            state: state.state,
            attributes: state.attributes,
            statistics,
        }
    }
}

/// One statistic point.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticOutput {
    #[serde(serialize_with = "serialize_datetime")]
    pub start: DateTime<Utc>,
    pub state: f64,
    pub sum: f64,
}

impl From<&StatisticPoint> for StatisticOutput {
    fn from(point: &StatisticPoint) -> Self {
        Self {
            start: point.start,
            state: point.state,
            sum: point.sum,
        }
    }
}

/// Settings output with the Home Assistant token hidden.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsOutput {
    pub scan_interval_secs: u64,
    pub api_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_assistant_url: Option<String>,
    pub home_assistant_token_set: bool,
    pub log_level: String,
}

impl From<&Settings> for SettingsOutput {
    fn from(settings: &Settings) -> Self {
        Self {
            scan_interval_secs: settings.scan_interval_secs,
            api_base_url: settings.api_base_url.clone(),
            home_assistant_url: settings.home_assistant.url.clone(),
            home_assistant_token_set: settings.home_assistant.token.is_some(),
            log_level: settings.log_level.to_string(),
        }
    }
}

// ============================================================================
// Serialization helpers
// ============================================================================

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_datetime<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339())
}

#[allow(clippy::ref_option)]
fn serialize_datetime_opt<S>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt {
        Some(dt) => s.serialize_str(&dt.to_rfc3339()),
        None => s.serialize_none(),
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats config entries.
    pub fn format_entries(&self, entries: &[ConfigEntry]) -> Result<String> {
        let outputs: Vec<EntryOutput> = entries.iter().map(EntryOutput::from).collect();
        self.format(&outputs)
    }

    /// Formats readings; a single entry is not wrapped in an array.
    pub fn format_readings(&self, outputs: &[ReadingsOutput]) -> Result<String> {
        if outputs.len() == 1 {
            self.format(&outputs[0])
        } else {
            self.format(&outputs)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
