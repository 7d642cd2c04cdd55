// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # eau3f Core
//!
//! Core types, models, and traits for the `eau3f` water meter bridge.
//!
//! This crate provides the foundational abstractions used across all other
//! `eau3f` crates, including:
//!
//! - Domain models (readings, config entries, sensor payloads)
//! - Error types
//! - Capability traits the integration is composed from
//! - Pure derivations over a reading list
//!
//! ## Key Types
//!
//! ### Readings
//! - [`Reading`] - One billing-period reading from the vendor API
//! - [`MeterKind`] - Hot or cold water meter
//!
//! ### Config Entries
//! - [`ConfigEntry`] - A stored bridge instance
//! - [`EntryData`] - Credentials and options
//! - [`Session`] - Immutable token snapshot
//!
//! ### Sensor Payloads
//! - [`SensorState`] - State plus attributes of one entity
//! - [`StatisticMetadata`] / [`StatisticPoint`] - Long-term statistics
//!
//! ### Capabilities
//! - [`ReadingSource`] - Produces readings
//! - [`SensorSink`] - Receives states and statistics
//! - [`EntryStore`] - Persists config entries

pub mod error;
pub mod models;
pub mod readings;
pub mod traits;

// Re-export error types
pub use error::{CoreError, UpdateFailed};

// Re-export all model types
pub use models::{
    // Readings
    MeterKind,
    Reading,
    parse_reading_date,
    // Config entries
    ConfigEntry,
    DOMAIN,
    ENTRY_VERSION,
    EntryData,
    EntryState,
    Session,
    // Sensor payloads
    DeviceClass,
    DeviceInfo,
    STATE_UNAVAILABLE,
    STATE_UNKNOWN,
    SensorState,
    StateClass,
    StatisticMetadata,
    StatisticPoint,
    UNIT_CUBIC_METERS,
};

// Re-export derivations
pub use readings::{build_statistics, detect_meters, latest_reading, readings_for};

// Re-export traits
pub use traits::{EntryStore, ReadingSource, SensorSink};
