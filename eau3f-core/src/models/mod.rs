//! Domain models for eau3f.
//!
//! This module contains the data structures shared by every crate of the
//! workspace: readings from the vendor API, stored config entries, and the
//! sensor/statistics payloads published to Home Assistant.
//!
//! ## Submodules
//!
//! - [`reading`] - Consumption readings (Reading, MeterKind)
//! - [`entry`] - Config entries (ConfigEntry, EntryData, Session)
//! - [`sensor`] - Sensor payloads (SensorState, StatisticPoint)

mod entry;
mod reading;
mod sensor;

// Re-export everything at the models level
pub use entry::{ConfigEntry, DOMAIN, ENTRY_VERSION, EntryData, EntryState, Session};
pub use reading::{MeterKind, Reading, parse_reading_date};
pub use sensor::{
    DeviceClass, DeviceInfo, STATE_UNAVAILABLE, STATE_UNKNOWN, SensorState, StateClass,
    StatisticMetadata, StatisticPoint, UNIT_CUBIC_METERS,
};
