// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # eau3f Fetch
//!
//! HTTP clients for the `eau3f` water meter bridge.
//!
//! This crate talks to the two remote systems of the bridge:
//!
//! ## Groupe 3F API
//!
//! [`api::Groupe3fApi`] wraps the vendor endpoints: login, 2FA confirmation,
//! account and contract lookup, and water readings. It never stores a token;
//! authenticated calls take an [`eau3f_core::Session`] snapshot.
//!
//! ## Home Assistant
//!
//! [`home_assistant::HomeAssistantSink`] implements
//! [`eau3f_core::SensorSink`] over the Home Assistant REST API.
//!
//! ## Example
//!
//! ```ignore
//! use eau3f_fetch::{Groupe3fApi, LoginStatus};
//!
//! let api = Groupe3fApi::new()?;
//! if let LoginStatus::Success { token } = api.login("me@example.com", "secret").await? {
//!     let session = api.session(token);
//!     let contract = api.get_contract_id(&session, "me@example.com").await?;
//!     let readings = api.get_water_consumption(&session, &contract).await?;
//! }
//! ```

pub mod api;
pub mod error;
pub mod home_assistant;
pub mod http;

// Re-export key types at crate root
pub use api::{BASE_URL, Groupe3fApi, LoginStatus};
pub use error::{FetchError, HttpError};
pub use home_assistant::{DEFAULT_HA_URL, HomeAssistantSink};
pub use http::HttpClient;
