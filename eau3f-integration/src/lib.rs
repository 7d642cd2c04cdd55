// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # eau3f Integration
//!
//! The Groupe 3F integration proper, composed from the capability traits in
//! `eau3f-core`.
//!
//! ## Components
//!
//! - [`ConfigFlow`] / [`FlowManager`] - Setup and reauth wizard
//! - [`ReauthenticatingSource`] - Fetch with one silent re-login
//! - [`UpdateCoordinator`] - Fixed-interval polling with a watch channel
//! - [`WaterSensor`] - One entity per detected meter kind
//! - [`setup_entry`] / [`LoadedEntry`] - Entry lifecycle
//!
//! ## Example
//!
//! ```ignore
//! use eau3f_integration::{SetupContext, setup_entry};
//!
//! let loaded = setup_entry(&entry, &ctx).await?;
//! for sensor in loaded.sensors() {
//!     println!("{}", sensor.entity_id());
//! }
//! loaded.unload().await?;
//! ```

pub mod config_flow;
pub mod coordinator;
pub mod error;
pub mod sensor;
pub mod setup;
pub mod sink;

pub use config_flow::{AbortReason, ConfigFlow, FlowManager, FlowResult, FlowStep, FormError, UserInput};
pub use coordinator::{CoordinatorState, ReauthenticatingSource, UpdateCoordinator};
pub use error::{FlowError, SetupError};
pub use sensor::{MANUFACTURER, WaterSensor};
pub use setup::{LoadedEntry, SetupContext, setup_entry, setup_entry_with_source};
pub use sink::LogSink;
