//! Interactive setup wizard.
//!
//! A flow walks the user through credentials, an optional one-time code,
//! and contract resolution. Every step returns a [`FlowResult`]: either the
//! next form to show, or a terminal outcome.
//!
//! ```text
//! user ──login──┬─ Success ───────────────┐
//!               └─ 2FA_REQUIRED ─> 2fa ───┴─> resolve contract ─> CreateEntry
//!                                                              └─> Abort
//! ```
//!
//! A reauth flow starts at `reauth_confirm` instead, keeps the stored
//! username and trusted id, and ends with [`FlowResult::UpdateEntry`].

use eau3f_core::{ConfigEntry, EntryData, EntryState, EntryStore};
use eau3f_fetch::{Groupe3fApi, LoginStatus};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::FlowError;

// ============================================================================
// Flow Results
// ============================================================================

/// Step identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowStep {
    /// Username, password and optional price.
    #[serde(rename = "user")]
    User,
    /// One-time code.
    #[serde(rename = "2fa")]
    TwoFactor,
    /// Password of an existing entry.
    #[serde(rename = "reauth_confirm")]
    ReauthConfirm,
}

impl FlowStep {
    /// Returns the step id.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStep::User => "user",
            FlowStep::TwoFactor => "2fa",
            FlowStep::ReauthConfirm => "reauth_confirm",
        }
    }
}

impl std::fmt::Display for FlowStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base error shown on a re-displayed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FormError {
    /// The API could not be reached or answered with an error status.
    CannotConnect,
    /// Credentials or one-time code were rejected.
    InvalidAuth,
    /// The API answered with something unexpected.
    Unknown,
}

impl FormError {
    /// Returns the error key.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormError::CannotConnect => "cannot_connect",
            FormError::InvalidAuth => "invalid_auth",
            FormError::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason a flow aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// No account or contract could be resolved.
    NoContracts,
    /// An entry for the contract already exists.
    AlreadyConfigured,
    /// A reauth logged into a different contract.
    WrongAccount,
}

impl AbortReason {
    /// Returns the reason key.
    pub fn as_str(&self) -> &'static str {
        match self {
            AbortReason::NoContracts => "no_contracts",
            AbortReason::AlreadyConfigured => "already_configured",
            AbortReason::WrongAccount => "wrong_account",
        }
    }
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a flow step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// Show a form, with an optional base error.
    ShowForm {
        /// Form to show.
        step_id: FlowStep,
        /// Base error, if the previous attempt failed.
        error: Option<FormError>,
    },
    /// Persist a new entry.
    CreateEntry {
        /// Entry title.
        title: String,
        /// Contract id.
        unique_id: String,
        /// Entry data.
        #[serde(skip)]
        data: EntryData,
    },
    /// Replace the data of an existing entry.
    UpdateEntry {
        /// Entry to update.
        entry_id: String,
        /// New entry data.
        #[serde(skip)]
        data: EntryData,
    },
    /// Stop without persisting anything.
    Abort {
        /// Why the flow stopped.
        reason: AbortReason,
    },
}

impl FlowResult {
    fn form(step_id: FlowStep) -> Self {
        FlowResult::ShowForm {
            step_id,
            error: None,
        }
    }

    fn form_error(step_id: FlowStep, error: FormError) -> Self {
        FlowResult::ShowForm {
            step_id,
            error: Some(error),
        }
    }

    fn abort(reason: AbortReason) -> Self {
        FlowResult::Abort { reason }
    }

    /// Returns true if the flow is finished.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FlowResult::ShowForm { .. })
    }
}

// ============================================================================
// Inputs
// ============================================================================

/// Input of the `user` step.
#[derive(Clone, PartialEq)]
pub struct UserInput {
    /// Account e-mail.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Price per m³ used for the cost annotation; 0 disables it.
    pub price_per_m3: f64,
}

impl UserInput {
    /// Creates an input without price.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            price_per_m3: 0.0,
        }
    }

    /// Sets the price per m³.
    #[must_use]
    pub fn with_price(mut self, price_per_m3: f64) -> Self {
        self.price_per_m3 = price_per_m3;
        self
    }
}

impl std::fmt::Debug for UserInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInput")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("price_per_m3", &self.price_per_m3)
            .finish()
    }
}

// ============================================================================
// Config Flow
// ============================================================================

enum FlowSource {
    User,
    Reauth(Box<ConfigEntry>),
}

/// One run of the setup wizard.
pub struct ConfigFlow {
    base_url: String,
    entries: Arc<dyn EntryStore>,
    source: FlowSource,
    api: Option<Groupe3fApi>,
    credentials: Option<UserInput>,
    step: FlowStep,
    finished: bool,
}

impl ConfigFlow {
    /// Starts a flow for a new entry.
    pub fn new(base_url: impl Into<String>, entries: Arc<dyn EntryStore>) -> Self {
        Self {
            base_url: base_url.into(),
            entries,
            source: FlowSource::User,
            api: None,
            credentials: None,
            step: FlowStep::User,
            finished: false,
        }
    }

    /// Starts a reauth flow for an existing entry.
    pub fn reauth(
        base_url: impl Into<String>,
        entries: Arc<dyn EntryStore>,
        entry: ConfigEntry,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            entries,
            source: FlowSource::Reauth(Box::new(entry)),
            api: None,
            credentials: None,
            step: FlowStep::ReauthConfirm,
            finished: false,
        }
    }

    /// Returns the step the flow is waiting on.
    pub fn step(&self) -> FlowStep {
        self.step
    }

    /// Returns true once a terminal result was produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the username a reauth flow is bound to.
    pub fn reauth_username(&self) -> Option<&str> {
        match &self.source {
            FlowSource::Reauth(entry) => Some(&entry.data.username),
            FlowSource::User => None,
        }
    }

    /// Returns the first form of the flow.
    pub fn init(&self) -> FlowResult {
        FlowResult::form(self.step)
    }

    fn ensure_step(&self, step: FlowStep) -> Result<(), FlowError> {
        if self.finished || self.step != step {
            return Err(FlowError::UnexpectedStep(step.as_str()));
        }
        Ok(())
    }

    /// Handles the `user` step.
    ///
    /// `None` shows the form. Each submission uses a fresh client and thus a
    /// fresh trusted id.
    ///
    /// # Errors
    ///
    /// Returns error if the flow is not at this step or the client cannot be
    /// built.
    #[instrument(skip(self, input))]
    pub async fn step_user(&mut self, input: Option<UserInput>) -> Result<FlowResult, FlowError> {
        self.ensure_step(FlowStep::User)?;
        let Some(input) = input else {
            return Ok(FlowResult::form(FlowStep::User));
        };

        debug!(username = %input.username, "Credentials submitted");
        self.api = Some(Groupe3fApi::with_base_url(&self.base_url)?);
        self.credentials = Some(input);
        self.login().await
    }

    /// Handles the `reauth_confirm` step with a new password.
    ///
    /// # Errors
    ///
    /// Returns error if the flow is not at this step or the client cannot be
    /// built.
    #[instrument(skip(self, password))]
    pub async fn step_reauth_confirm(
        &mut self,
        password: Option<String>,
    ) -> Result<FlowResult, FlowError> {
        self.ensure_step(FlowStep::ReauthConfirm)?;
        let Some(password) = password else {
            return Ok(FlowResult::form(FlowStep::ReauthConfirm));
        };
        let FlowSource::Reauth(entry) = &self.source else {
            return Err(FlowError::UnexpectedStep(FlowStep::ReauthConfirm.as_str()));
        };

        let api = Groupe3fApi::with_base_url(&self.base_url)?
            .with_trusted_id(entry.data.trusted_id.clone());
        self.credentials = Some(UserInput {
            username: entry.data.username.clone(),
            password,
            price_per_m3: entry.data.price_per_m3,
        });
        self.api = Some(api);
        self.login().await
    }

    /// Handles the `2fa` step.
    ///
    /// # Errors
    ///
    /// Returns error if no login asked for a code.
    #[instrument(skip(self, code))]
    pub async fn step_2fa(&mut self, code: Option<&str>) -> Result<FlowResult, FlowError> {
        self.ensure_step(FlowStep::TwoFactor)?;
        let Some(code) = code else {
            return Ok(FlowResult::form(FlowStep::TwoFactor));
        };
        let api = self
            .api
            .as_ref()
            .ok_or(FlowError::UnexpectedStep(FlowStep::TwoFactor.as_str()))?;

        let outcome = api.check_2fa(code.trim()).await;
        match outcome {
            Ok(token) => self.finish(token).await,
            Err(e) => {
                warn!(error = %e, "2FA confirmation failed");
                Ok(FlowResult::form_error(FlowStep::TwoFactor, FormError::InvalidAuth))
            }
        }
    }

    fn credentials_step(&self) -> FlowStep {
        match self.source {
            FlowSource::User => FlowStep::User,
            FlowSource::Reauth(_) => FlowStep::ReauthConfirm,
        }
    }

    async fn login(&mut self) -> Result<FlowResult, FlowError> {
        let form = self.credentials_step();
        let status = {
            let (Some(api), Some(credentials)) = (&self.api, &self.credentials) else {
                return Err(FlowError::UnexpectedStep(form.as_str()));
            };
            api.login(&credentials.username, &credentials.password)
                .await
        };

        match status {
            Ok(LoginStatus::Success { token }) => self.finish(token).await,
            Ok(LoginStatus::TwoFactorRequired) => {
                info!("One-time code required");
                self.step = FlowStep::TwoFactor;
                Ok(FlowResult::form(FlowStep::TwoFactor))
            }
            Ok(LoginStatus::Error { message }) => {
                warn!(message = %message, "Login refused");
                Ok(FlowResult::form_error(form, FormError::Unknown))
            }
            Err(e) if e.is_auth() => {
                warn!(error = %e, "Credentials rejected");
                Ok(FlowResult::form_error(form, FormError::InvalidAuth))
            }
            Err(e) => {
                warn!(error = %e, "Login request failed");
                Ok(FlowResult::form_error(form, FormError::CannotConnect))
            }
        }
    }

    /// Resolves the contract and builds the terminal result.
    async fn finish(&mut self, token: String) -> Result<FlowResult, FlowError> {
        let (Some(api), Some(credentials)) = (&self.api, &self.credentials) else {
            return Err(FlowError::UnexpectedStep("finish"));
        };
        let session = api.session(token);

        let contract_id = match api.get_contract_id(&session, &credentials.username).await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Contract lookup failed");
                self.finished = true;
                return Ok(FlowResult::abort(AbortReason::NoContracts));
            }
        };

        let result = match &self.source {
            FlowSource::User => {
                if self.entries.find_by_unique_id(&contract_id).await.is_some() {
                    info!(contract_id = %contract_id, "Contract already configured");
                    FlowResult::abort(AbortReason::AlreadyConfigured)
                } else {
                    info!(contract_id = %contract_id, "Contract resolved");
                    FlowResult::CreateEntry {
                        title: ConfigEntry::title_for_contract(&contract_id),
                        data: EntryData {
                            username: credentials.username.clone(),
                            password: credentials.password.clone(),
                            contract_id: contract_id.clone(),
                            token: session.token.clone(),
                            trusted_id: session.trusted_id.clone(),
                            price_per_m3: credentials.price_per_m3,
                        },
                        unique_id: contract_id,
                    }
                }
            }
            FlowSource::Reauth(entry) => {
                if entry.unique_id.as_deref() == Some(contract_id.as_str()) {
                    info!(entry_id = %entry.entry_id, "Re-authenticated");
                    FlowResult::UpdateEntry {
                        entry_id: entry.entry_id.clone(),
                        data: EntryData {
                            password: credentials.password.clone(),
                            ..entry.data.with_session(&session)
                        },
                    }
                } else {
                    warn!(contract_id = %contract_id, "Reauth resolved a different contract");
                    FlowResult::abort(AbortReason::WrongAccount)
                }
            }
        };

        self.finished = true;
        Ok(result)
    }
}

// ============================================================================
// Flow Manager
// ============================================================================

/// Starts flows and applies their results to the entry store.
#[derive(Clone)]
pub struct FlowManager {
    base_url: String,
    entries: Arc<dyn EntryStore>,
}

impl FlowManager {
    /// Creates a manager for the given API and store.
    pub fn new(base_url: impl Into<String>, entries: Arc<dyn EntryStore>) -> Self {
        Self {
            base_url: base_url.into(),
            entries,
        }
    }

    /// Starts a flow for a new entry.
    pub fn start_user(&self) -> ConfigFlow {
        ConfigFlow::new(self.base_url.clone(), Arc::clone(&self.entries))
    }

    /// Starts a reauth flow.
    ///
    /// # Errors
    ///
    /// Returns error if the entry does not exist.
    pub async fn start_reauth(&self, entry_id: &str) -> Result<ConfigFlow, FlowError> {
        let entry = self
            .entries
            .get(entry_id)
            .await
            .ok_or_else(|| eau3f_core::CoreError::EntryNotFound(entry_id.to_string()))?;
        Ok(ConfigFlow::reauth(
            self.base_url.clone(),
            Arc::clone(&self.entries),
            entry,
        ))
    }

    /// Applies a terminal result. Returns the created or updated entry.
    ///
    /// A re-authenticated entry goes back to `not_loaded` so the next run
    /// sets it up again.
    ///
    /// # Errors
    ///
    /// Returns error if the store rejects the change.
    pub async fn apply(&self, result: FlowResult) -> Result<Option<ConfigEntry>, FlowError> {
        match result {
            FlowResult::CreateEntry {
                title,
                unique_id,
                data,
            } => {
                let entry = ConfigEntry::new(title, Some(unique_id), data);
                self.entries.add(entry.clone()).await?;
                Ok(Some(entry))
            }
            FlowResult::UpdateEntry { entry_id, data } => {
                self.entries.update_data(&entry_id, data).await?;
                self.entries
                    .set_state(&entry_id, EntryState::NotLoaded)
                    .await?;
                Ok(self.entries.get(&entry_id).await)
            }
            FlowResult::ShowForm { .. } | FlowResult::Abort { .. } => Ok(None),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use eau3f_store::JsonEntryStore;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    fn store() -> Arc<dyn EntryStore> {
        Arc::new(JsonEntryStore::in_memory())
    }

    async fn mock_contract(server: &mut ServerGuard, contract_id: &str) {
        server
            .mock("GET", "/comptes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!([{"client": {"caintNum": "C1"}}]).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/sommaires")
            .match_query(Matcher::UrlEncoded("caint_num".into(), "C1".into()))
            .with_status(200)
            .with_body(json!([{"contratId": contract_id}]).to_string())
            .create_async()
            .await;
    }

    #[tokio::test]
    async fn test_user_step_shows_form() {
        let mut flow = ConfigFlow::new("http://127.0.0.1:1", store());
        let result = flow.step_user(None).await.unwrap();
        assert_eq!(result, FlowResult::form(FlowStep::User));
        assert!(!result.is_terminal());
    }

    #[tokio::test]
    async fn test_direct_login_creates_entry() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"token": "tok"}"#)
            .create_async()
            .await;
        mock_contract(&mut server, "123").await;

        let mut flow = ConfigFlow::new(server.url(), store());
        let result = flow
            .step_user(Some(UserInput::new("u@example.com", "pw").with_price(3.5)))
            .await
            .unwrap();

        let FlowResult::CreateEntry {
            title,
            unique_id,
            data,
        } = result
        else {
            panic!("expected CreateEntry, got {result:?}");
        };
        assert_eq!(title, "Contrat 123");
        assert_eq!(unique_id, "123");
        assert_eq!(data.token, "tok");
        assert_eq!(data.contract_id, "123");
        assert_eq!(data.price(), Some(3.5));
        assert!(!data.trusted_id.is_empty());
        assert!(flow.is_finished());
    }

    #[tokio::test]
    async fn test_two_factor_path() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"message": "2FA_REQUIRED"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/login/2fa_check")
            .match_body(Matcher::PartialJson(json!({"data": {"authCode": "123456"}})))
            .with_status(200)
            .with_body(r#"{"token": "tok2"}"#)
            .create_async()
            .await;
        mock_contract(&mut server, "77").await;

        let mut flow = ConfigFlow::new(server.url(), store());
        let result = flow
            .step_user(Some(UserInput::new("u@example.com", "pw")))
            .await
            .unwrap();
        assert_eq!(result, FlowResult::form(FlowStep::TwoFactor));
        assert_eq!(flow.step(), FlowStep::TwoFactor);

        let result = flow.step_2fa(Some(" 123456 ")).await.unwrap();
        assert!(matches!(
            result,
            FlowResult::CreateEntry { ref data, .. } if data.token == "tok2"
        ));
    }

    #[tokio::test]
    async fn test_bad_code_reshows_form() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"message": "2FA_REQUIRED"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/login/2fa_check")
            .with_status(200)
            .with_body(r#"{"message": "bad code"}"#)
            .create_async()
            .await;

        let mut flow = ConfigFlow::new(server.url(), store());
        flow.step_user(Some(UserInput::new("u@example.com", "pw")))
            .await
            .unwrap();

        let result = flow.step_2fa(Some("000000")).await.unwrap();
        assert_eq!(
            result,
            FlowResult::form_error(FlowStep::TwoFactor, FormError::InvalidAuth)
        );
        assert!(!flow.is_finished());
    }

    #[tokio::test]
    async fn test_login_errors_map_to_form_errors() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(500)
            .create_async()
            .await;

        let mut flow = ConfigFlow::new(server.url(), store());
        let result = flow
            .step_user(Some(UserInput::new("u@example.com", "pw")))
            .await
            .unwrap();
        assert_eq!(
            result,
            FlowResult::form_error(FlowStep::User, FormError::CannotConnect)
        );

        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"message": "something else"}"#)
            .create_async()
            .await;

        let mut flow = ConfigFlow::new(server.url(), store());
        let result = flow
            .step_user(Some(UserInput::new("u@example.com", "pw")))
            .await
            .unwrap();
        assert_eq!(
            result,
            FlowResult::form_error(FlowStep::User, FormError::Unknown)
        );
    }

    #[tokio::test]
    async fn test_two_factor_on_resubmitted_login() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .match_body(Matcher::PartialJson(json!({"password": "first-pw"})))
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("POST", "/login")
            .match_body(Matcher::PartialJson(json!({"password": "second-pw"})))
            .with_status(200)
            .with_body(r#"{"message": "2FA_REQUIRED"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/login/2fa_check")
            .with_status(200)
            .with_body(r#"{"token": "tok"}"#)
            .create_async()
            .await;
        mock_contract(&mut server, "55").await;

        let mut flow = ConfigFlow::new(server.url(), store());
        let result = flow
            .step_user(Some(UserInput::new("u@example.com", "first-pw")))
            .await
            .unwrap();
        assert_eq!(
            result,
            FlowResult::form_error(FlowStep::User, FormError::CannotConnect)
        );

        let result = flow
            .step_user(Some(UserInput::new("u@example.com", "second-pw")))
            .await
            .unwrap();
        assert_eq!(result, FlowResult::form(FlowStep::TwoFactor));

        let result = flow.step_2fa(Some("123456")).await.unwrap();
        assert!(result.is_terminal());
        assert!(matches!(
            result,
            FlowResult::CreateEntry { ref unique_id, ref data, .. }
                if unique_id == "55" && data.token == "tok"
        ));
    }

    #[tokio::test]
    async fn test_missing_contract_aborts() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"token": "tok"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/comptes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let entries = store();
        let mut flow = ConfigFlow::new(server.url(), Arc::clone(&entries));
        let result = flow
            .step_user(Some(UserInput::new("u@example.com", "pw")))
            .await
            .unwrap();
        assert_eq!(result, FlowResult::abort(AbortReason::NoContracts));
        assert!(entries.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_already_configured_aborts() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"token": "tok"}"#)
            .create_async()
            .await;
        mock_contract(&mut server, "123").await;

        let manager = FlowManager::new(server.url(), store());
        let mut first = manager.start_user();
        let created = first
            .step_user(Some(UserInput::new("u@example.com", "pw")))
            .await
            .unwrap();
        assert!(manager.apply(created).await.unwrap().is_some());

        let mut second = manager.start_user();
        let result = second
            .step_user(Some(UserInput::new("u@example.com", "pw")))
            .await
            .unwrap();
        assert_eq!(result, FlowResult::abort(AbortReason::AlreadyConfigured));
    }

    #[tokio::test]
    async fn test_reauth_updates_token_only() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .match_body(Matcher::PartialJson(json!({
                "username": "u@example.com",
                "password": "new-pw",
                "data": {"trusted": "device-1"}
            })))
            .with_status(200)
            .with_body(r#"{"token": "fresh"}"#)
            .create_async()
            .await;
        mock_contract(&mut server, "123").await;

        let entries = store();
        let entry = ConfigEntry::new(
            "Contrat 123",
            Some("123".to_string()),
            EntryData {
                username: "u@example.com".to_string(),
                password: "old-pw".to_string(),
                contract_id: "123".to_string(),
                token: "stale".to_string(),
                trusted_id: "device-1".to_string(),
                price_per_m3: 4.0,
            },
        );
        let entry_id = entry.entry_id.clone();
        entries.add(entry).await.unwrap();

        let manager = FlowManager::new(server.url(), Arc::clone(&entries));
        let mut flow = manager.start_reauth(&entry_id).await.unwrap();
        assert_eq!(flow.init(), FlowResult::form(FlowStep::ReauthConfirm));
        assert_eq!(flow.reauth_username(), Some("u@example.com"));

        let result = flow
            .step_reauth_confirm(Some("new-pw".to_string()))
            .await
            .unwrap();
        let updated = manager.apply(result).await.unwrap().unwrap();
        assert_eq!(updated.data.token, "fresh");
        assert_eq!(updated.data.password, "new-pw");
        assert_eq!(updated.data.trusted_id, "device-1");
        assert_eq!(updated.data.price(), Some(4.0));
        assert_eq!(updated.state, EntryState::NotLoaded);
    }

    #[tokio::test]
    async fn test_reauth_with_two_factor_keeps_trusted_id() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .match_body(Matcher::PartialJson(json!({"data": {"trusted": "device-1"}})))
            .with_status(200)
            .with_body(r#"{"message": "2FA_REQUIRED"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/login/2fa_check")
            .match_body(Matcher::PartialJson(json!({
                "data": {"authCode": "654321", "trusted": "device-1"}
            })))
            .with_status(200)
            .with_body(r#"{"token": "fresh"}"#)
            .create_async()
            .await;
        mock_contract(&mut server, "123").await;

        let entries = store();
        let entry = ConfigEntry::new(
            "Contrat 123",
            Some("123".to_string()),
            EntryData {
                username: "u@example.com".to_string(),
                password: "old-pw".to_string(),
                contract_id: "123".to_string(),
                token: "stale".to_string(),
                trusted_id: "device-1".to_string(),
                price_per_m3: 0.0,
            },
        );
        let entry_id = entry.entry_id.clone();
        entries.add(entry).await.unwrap();

        let manager = FlowManager::new(server.url(), Arc::clone(&entries));
        let mut flow = manager.start_reauth(&entry_id).await.unwrap();
        let result = flow
            .step_reauth_confirm(Some("new-pw".to_string()))
            .await
            .unwrap();
        assert_eq!(result, FlowResult::form(FlowStep::TwoFactor));

        let result = flow.step_2fa(Some("654321")).await.unwrap();
        let FlowResult::UpdateEntry {
            entry_id: ref updated_id,
            ref data,
        } = result
        else {
            panic!("expected UpdateEntry, got {result:?}");
        };
        assert_eq!(updated_id, &entry_id);
        assert_eq!(data.token, "fresh");
        assert_eq!(data.trusted_id, "device-1");

        let updated = manager.apply(result).await.unwrap().unwrap();
        assert_eq!(updated.data.token, "fresh");
        assert_eq!(updated.data.password, "new-pw");
    }

    #[tokio::test]
    async fn test_reauth_wrong_account() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/login")
            .with_status(200)
            .with_body(r#"{"token": "fresh"}"#)
            .create_async()
            .await;
        mock_contract(&mut server, "999").await;

        let entry = ConfigEntry::new(
            "Contrat 123",
            Some("123".to_string()),
            EntryData {
                username: "u@example.com".to_string(),
                password: "pw".to_string(),
                contract_id: "123".to_string(),
                token: "stale".to_string(),
                trusted_id: "device-1".to_string(),
                price_per_m3: 0.0,
            },
        );
        let mut flow = ConfigFlow::reauth(server.url(), store(), entry);
        let result = flow
            .step_reauth_confirm(Some("pw".to_string()))
            .await
            .unwrap();
        assert_eq!(result, FlowResult::abort(AbortReason::WrongAccount));
    }

    #[tokio::test]
    async fn test_steps_out_of_order() {
        let mut flow = ConfigFlow::new("http://127.0.0.1:1", store());
        assert!(matches!(
            flow.step_2fa(Some("1")).await,
            Err(FlowError::UnexpectedStep("2fa"))
        ));
        assert!(matches!(
            flow.step_reauth_confirm(None).await,
            Err(FlowError::UnexpectedStep("reauth_confirm"))
        ));
    }

    #[test]
    fn test_result_serialization() {
        let value = serde_json::to_value(FlowResult::form_error(
            FlowStep::TwoFactor,
            FormError::InvalidAuth,
        ))
        .unwrap();
        assert_eq!(
            value,
            json!({"type": "show_form", "step_id": "2fa", "error": "invalid_auth"})
        );
    }
}
