//! Groupe 3F API client.
//!
//! Wraps the e-client REST endpoints used by the bridge: login, 2FA
//! confirmation, account and contract lookup, and water readings.
//!
//! The client itself never stores a bearer token. Login calls return the
//! token, and authenticated calls take a [`Session`] snapshot.

use eau3f_core::{Reading, Session};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::error::FetchError;
use crate::http::{HttpClient, host_of};

// ============================================================================
// Constants
// ============================================================================

/// Production API base URL.
pub const BASE_URL: &str = "https://api-eclient.groupe3f.fr";

/// Login endpoint.
const LOGIN_ENDPOINT: &str = "/login";

/// 2FA confirmation endpoint.
const TWO_FACTOR_ENDPOINT: &str = "/login/2fa_check";

/// Account lookup endpoint.
const ACCOUNTS_ENDPOINT: &str = "/comptes";

/// Contract summary endpoint.
const SUMMARIES_ENDPOINT: &str = "/sommaires";

/// Message sent back when a one-time code is needed.
const TWO_FACTOR_REQUIRED: &str = "2FA_REQUIRED";

/// Browser fingerprint expected by the API.
const USER_AGENT_VALUE: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36";
const ACCEPT_VALUE: &str = "application/json, text/plain, */*";
const APP_VERSION_HEADER: &str = "3f-version-app";
const APP_VERSION_VALUE: &str = "2.3.4";
const REFERER_VALUE: &str = "https://eclient.groupe3f.fr/";
const ORIGIN_VALUE: &str = "https://eclient.groupe3f.fr";

// ============================================================================
// Login Status
// ============================================================================

/// Outcome of a login attempt.
#[derive(Clone, PartialEq, Eq)]
pub enum LoginStatus {
    /// Logged in.
    Success {
        /// Bearer token.
        token: String,
    },
    /// A one-time code must be confirmed with [`Groupe3fApi::check_2fa`].
    TwoFactorRequired,
    /// The server answered with something unexpected.
    Error {
        /// Description of the answer.
        message: String,
    },
}

impl std::fmt::Debug for LoginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginStatus::Success { .. } => write!(f, "Success"),
            LoginStatus::TwoFactorRequired => write!(f, "TwoFactorRequired"),
            LoginStatus::Error { message } => write!(f, "Error({message})"),
        }
    }
}

// ============================================================================
// API Client
// ============================================================================

/// Groupe 3F API client.
///
/// Holds the base URL and the trusted-device id sent with every login.
#[derive(Debug, Clone)]
pub struct Groupe3fApi {
    http: HttpClient,
    base_url: String,
    trusted_id: String,
}

impl Groupe3fApi {
    /// Creates a client for the production API with a fresh trusted id.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_base_url(BASE_URL)
    }

    /// Creates a client for another base URL with a fresh trusted id.
    ///
    /// Requests are restricted to the host of `base_url`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL is invalid or the HTTP client cannot be built.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let host = host_of(&base_url)?;
        let http = HttpClient::new()?.with_allowed_domains(vec![host]);

        Ok(Self {
            http,
            base_url,
            trusted_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    /// Reuses a stored trusted id. Empty ids are ignored.
    pub fn with_trusted_id(mut self, trusted_id: impl Into<String>) -> Self {
        let trusted_id = trusted_id.into();
        if !trusted_id.is_empty() {
            self.trusted_id = trusted_id;
        }
        self
    }

    /// Returns the trusted-device id.
    pub fn trusted_id(&self) -> &str {
        &self.trusted_id
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Wraps a token into a session carrying this client's trusted id.
    pub fn session(&self, token: impl Into<String>) -> Session {
        Session::new(token, self.trusted_id.clone())
    }

    /// Build request headers.
    fn build_headers(&self, token: Option<&str>) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(APP_VERSION_HEADER, HeaderValue::from_static(APP_VERSION_VALUE));
        headers.insert(REFERER, HeaderValue::from_static(REFERER_VALUE));
        headers.insert(ORIGIN, HeaderValue::from_static(ORIGIN_VALUE));

        if let Some(token) = token {
            let auth_value = format!("Bearer {token}");
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| FetchError::InvalidResponse(format!("Invalid token: {e}")))?,
            );
        }

        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn url_with_query(&self, path: &str, key: &str, value: &str) -> Result<String, FetchError> {
        let mut url =
            Url::parse(&self.url(path)).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair(key, value);
        Ok(url.into())
    }

    /// Attempts to log in.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginStatus, FetchError> {
        debug!("Logging in");

        let payload = json!({
            "username": username,
            "password": password,
            "data": {"trusted": self.trusted_id},
        });

        let body = self
            .post_json(LOGIN_ENDPOINT, &payload)
            .await
            .inspect_err(|e| error!(error = %e, "Login failed"))?;

        if let Some(token) = body.get("token").and_then(Value::as_str) {
            debug!("Login succeeded");
            return Ok(LoginStatus::Success {
                token: token.to_string(),
            });
        }

        if body.get("message").and_then(Value::as_str) == Some(TWO_FACTOR_REQUIRED) {
            debug!("Login requires 2FA");
            return Ok(LoginStatus::TwoFactorRequired);
        }

        warn!("Unexpected login response");
        Ok(LoginStatus::Error {
            message: "Unknown response".to_string(),
        })
    }

    /// Confirms a one-time code and returns the bearer token.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-success status, or a
    /// response without token.
    #[instrument(skip(self, code))]
    pub async fn check_2fa(&self, code: &str) -> Result<String, FetchError> {
        debug!("Confirming 2FA code");

        let payload = json!({
            "data": {
                "authCode": code,
                "trusted": self.trusted_id,
            },
        });

        let body = self.post_json(TWO_FACTOR_ENDPOINT, &payload).await?;

        body.get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| FetchError::InvalidResponse("Invalid 2FA response".to_string()))
    }

    /// Resolves the contract id of an account.
    ///
    /// Looks up the account by e-mail to get its internal client number,
    /// then takes the first contract listed for that client.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::NotFound`] if either lookup yields no data.
    #[instrument(skip(self, session))]
    pub async fn get_contract_id(
        &self,
        session: &Session,
        email: &str,
    ) -> Result<String, FetchError> {
        debug!("Resolving contract id");

        let url = self.url_with_query(ACCOUNTS_ENDPOINT, "email", email)?;
        let accounts: Value = self.get_json(&url, session, ACCOUNTS_ENDPOINT).await?;
        let caint_num = accounts
            .as_array()
            .and_then(|list| list.first())
            .and_then(|account| account.get("client"))
            .and_then(|client| client.get("caintNum"))
            .and_then(scalar_to_string)
            .ok_or_else(|| FetchError::NotFound("No account found".to_string()))?;
        debug!(caint_num = %caint_num, "Account found");

        let url = self.url_with_query(SUMMARIES_ENDPOINT, "caint_num", &caint_num)?;
        let contracts: Value = self.get_json(&url, session, SUMMARIES_ENDPOINT).await?;
        let contract_id = contracts
            .as_array()
            .and_then(|list| list.first())
            .and_then(|contract| contract.get("contratId"))
            .and_then(scalar_to_string)
            .ok_or_else(|| FetchError::NotFound("No contracts found".to_string()))?;
        debug!(contract_id = %contract_id, "Contract found");

        Ok(contract_id)
    }

    /// Fetches the water readings of a contract.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, a non-success status, or a body
    /// that is not a reading list.
    #[instrument(skip(self, session))]
    pub async fn get_water_consumption(
        &self,
        session: &Session,
        contract_id: &str,
    ) -> Result<Vec<Reading>, FetchError> {
        debug!("Fetching water consumption");

        let path = format!("/contrats/{contract_id}/eau_consos");
        let readings: Vec<Reading> = self.get_json(&self.url(&path), session, &path).await?;

        debug!(count = readings.len(), "Readings received");
        Ok(readings)
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, FetchError> {
        let headers = self.build_headers(None)?;
        let response = self
            .http
            .post_json_with_headers(&self.url(path), headers, payload)
            .await?;
        read_json(response, path).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        session: &Session,
        path: &str,
    ) -> Result<T, FetchError> {
        let headers = self.build_headers(Some(&session.token))?;
        let response = self.http.get_with_headers(url, headers).await?;
        read_json(response, path).await
    }
}

/// Checks the status and parses a JSON body.
async fn read_json<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, FetchError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::AuthenticationFailed(format!(
            "HTTP {} on {}",
            status.as_u16(),
            path
        )));
    }

    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            message: path.to_string(),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        warn!(error = %e, path = %path, "Failed to parse response");
        FetchError::InvalidResponse(format!("JSON error: {e}"))
    })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
