//! Home Assistant REST sink.
//!
//! Publishes sensor states through `POST /api/states/<entity_id>` and
//! imports long-term statistics through the `recorder.import_statistics`
//! service, authenticated with a long-lived access token.

use async_trait::async_trait;
use eau3f_core::{CoreError, SensorSink, SensorState, StatisticMetadata, StatisticPoint};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument};

use crate::error::FetchError;
use crate::http::{HttpClient, host_of};

/// Default Home Assistant URL.
pub const DEFAULT_HA_URL: &str = "http://localhost:8123";

/// Statistics import service path.
const IMPORT_STATISTICS_SERVICE: &str = "/api/services/recorder/import_statistics";

// ============================================================================
// Sink
// ============================================================================

/// Home Assistant REST API client acting as a [`SensorSink`].
///
/// Requests are restricted to the Home Assistant host.
#[derive(Clone)]
pub struct HomeAssistantSink {
    base_url: String,
    authorization: HeaderValue,
    http: HttpClient,
}

impl std::fmt::Debug for HomeAssistantSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeAssistantSink")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HomeAssistantSink {
    /// Creates a new sink.
    ///
    /// # Errors
    ///
    /// Returns error if the URL has no host, the token is not a valid header
    /// value, or the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl AsRef<str>) -> Result<Self, FetchError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = HttpClient::new()?.with_allowed_domains(vec![host_of(&base_url)?]);

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token.as_ref()))
            .map_err(|_| {
                FetchError::AuthenticationFailed(
                    "Home Assistant token contains invalid characters".to_string(),
                )
            })?;
        authorization.set_sensitive(true);

        Ok(Self {
            base_url,
            authorization,
            http,
        })
    }

    /// Creates a sink from configuration values.
    ///
    /// A missing URL means [`DEFAULT_HA_URL`].
    ///
    /// # Errors
    ///
    /// Returns error if no token is configured.
    pub fn from_config(base_url: Option<String>, token: Option<String>) -> Result<Self, FetchError> {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_HA_URL.to_string());
        let token = token.ok_or_else(|| {
            FetchError::AuthenticationFailed("Home Assistant token is not configured".to_string())
        })?;

        info!(url = %base_url, "Using Home Assistant");
        Self::new(base_url, token)
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        headers
    }

    /// Checks that the API is reachable and the token is accepted.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the token is rejected.
    pub async fn check(&self) -> Result<(), FetchError> {
        let url = format!("{}/api/", self.base_url);
        let response = self.http.get_with_headers(&url, self.headers()).await?;
        check_status(response).await.map(|_| ())
    }

    /// Writes the state of one entity.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Home Assistant rejects it.
    #[instrument(skip(self, state), fields(entity_id = %state.entity_id))]
    pub async fn post_state(&self, state: &SensorState) -> Result<(), FetchError> {
        let url = format!("{}/api/states/{}", self.base_url, state.entity_id);
        let body = json!({
            "state": state.state,
            "attributes": state.attributes,
        });

        debug!(state = %state.state, "Posting state");
        let response = self
            .http
            .post_json_with_headers(&url, self.headers(), &body)
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// Imports a statistics series.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Home Assistant rejects it.
    #[instrument(skip(self, metadata, points), fields(statistic_id = %metadata.statistic_id))]
    pub async fn post_statistics(
        &self,
        metadata: &StatisticMetadata,
        points: &[StatisticPoint],
    ) -> Result<(), FetchError> {
        let url = format!("{}{}", self.base_url, IMPORT_STATISTICS_SERVICE);
        let body = statistics_payload(metadata, points);

        debug!(count = points.len(), "Importing statistics");
        let response = self
            .http
            .post_json_with_headers(&url, self.headers(), &body)
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

/// Builds the `recorder.import_statistics` service data.
fn statistics_payload(metadata: &StatisticMetadata, points: &[StatisticPoint]) -> Value {
    let stats: Vec<Value> = points
        .iter()
        .map(|p| {
            json!({
                "start": p.start.to_rfc3339(),
                "state": p.state,
                "sum": p.sum,
            })
        })
        .collect();

    json!({
        "statistic_id": metadata.statistic_id,
        "source": metadata.source,
        "name": metadata.name,
        "unit_of_measurement": metadata.unit_of_measurement,
        "has_mean": metadata.has_mean,
        "has_sum": metadata.has_sum,
        "stats": stats,
    })
}

async fn check_status(response: Response) -> Result<Response, FetchError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!("Home Assistant rejected the access token");
            Err(FetchError::AuthenticationFailed(
                "Home Assistant rejected the access token".to_string(),
            ))
        }
        status => {
            let message = response.text().await.unwrap_or_default();
            error!(status = %status, message = %message, "Home Assistant API error");
            Err(FetchError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl SensorSink for HomeAssistantSink {
    async fn publish_state(&self, state: &SensorState) -> Result<(), CoreError> {
        self.post_state(state)
            .await
            .map_err(|e| CoreError::Sink(e.to_string()))
    }

    async fn import_statistics(
        &self,
        metadata: &StatisticMetadata,
        points: &[StatisticPoint],
    ) -> Result<(), CoreError> {
        self.post_statistics(metadata, points)
            .await
            .map_err(|e| CoreError::Sink(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::Map;

    fn sample_state() -> SensorState {
        let mut attributes = Map::new();
        attributes.insert("last_reading".to_string(), json!("2026-02-01T00:00:00+00:00"));
        SensorState {
            entity_id: "sensor.compteur_3f_42_eau_froide".to_string(),
            unique_id: "42_compteurFroid".to_string(),
            state: "120".to_string(),
            attributes,
        }
    }

    fn sample_metadata() -> StatisticMetadata {
        StatisticMetadata {
            statistic_id: "sensor.compteur_3f_42_eau_froide".to_string(),
            source: "recorder".to_string(),
            name: Some("Eau Froide".to_string()),
            unit_of_measurement: "m³".to_string(),
            has_mean: false,
            has_sum: true,
        }
    }

    #[tokio::test]
    async fn test_post_state() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/states/sensor.compteur_3f_42_eau_froide")
            .match_header("authorization", "Bearer ha_token")
            .match_body(Matcher::Json(json!({
                "state": "120",
                "attributes": {"last_reading": "2026-02-01T00:00:00+00:00"}
            })))
            .with_status(201)
            .create_async()
            .await;

        let sink = HomeAssistantSink::new(server.url(), "ha_token").unwrap();
        sink.publish_state(&sample_state()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_state_unauthorized() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let sink = HomeAssistantSink::new(server.url(), "bad").unwrap();
        let result = sink.post_state(&sample_state()).await;
        assert!(matches!(result, Err(FetchError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_import_statistics() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/services/recorder/import_statistics")
            .match_header("authorization", "Bearer ha_token")
            .match_body(Matcher::PartialJson(json!({
                "statistic_id": "sensor.compteur_3f_42_eau_froide",
                "has_sum": true,
                "stats": [
                    {"start": "2026-01-01T00:00:00+00:00", "state": 100.0, "sum": 100.0},
                    {"start": "2026-02-01T00:00:00+00:00", "state": 120.0, "sum": 120.0}
                ]
            })))
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let points = vec![
            StatisticPoint {
                start: "2026-01-01T00:00:00Z".parse().unwrap(),
                state: 100.0,
                sum: 100.0,
            },
            StatisticPoint {
                start: "2026-02-01T00:00:00Z".parse().unwrap(),
                state: 120.0,
                sum: 120.0,
            },
        ];

        let sink = HomeAssistantSink::new(server.url(), "ha_token").unwrap();
        sink.import_statistics(&sample_metadata(), &points)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_maps_to_sink_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let sink = HomeAssistantSink::new(server.url(), "ha_token").unwrap();
        let result = sink.import_statistics(&sample_metadata(), &[]).await;
        assert!(matches!(result, Err(CoreError::Sink(ref m)) if m.contains("500")));
    }

    #[test]
    fn test_from_config_uses_given_values() {
        let sink = HomeAssistantSink::from_config(
            Some("http://ha.local:8123/".to_string()),
            Some("explicit".to_string()),
        )
        .unwrap();
        assert_eq!(sink.base_url(), "http://ha.local:8123");

        let sink = HomeAssistantSink::from_config(None, Some("explicit".to_string())).unwrap();
        assert_eq!(sink.base_url(), DEFAULT_HA_URL);
    }

    #[test]
    fn test_from_config_requires_token() {
        let result = HomeAssistantSink::from_config(Some("http://ha.local:8123".to_string()), None);
        assert!(matches!(result, Err(FetchError::AuthenticationFailed(_))));
    }

    #[test]
    fn test_token_never_shown_in_debug() {
        let sink = HomeAssistantSink::new("http://ha.local:8123", "secret-token").unwrap();
        assert!(!format!("{sink:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn test_requests_stay_on_home_assistant_host() {
        let sink = HomeAssistantSink::new("http://ha.local:8123", "ha_token").unwrap();
        let result = sink
            .http
            .get_with_headers("http://evil.com/api/", sink.headers())
            .await;
        assert!(matches!(result, Err(crate::HttpError::DomainNotAllowed(ref h)) if h == "evil.com"));
    }
}
