//! Silent re-login tests against a mocked vendor API.

use eau3f_core::{ConfigEntry, EntryData, EntryStore, ReadingSource, UpdateFailed};
use eau3f_integration::ReauthenticatingSource;
use eau3f_store::JsonEntryStore;
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

const CONSUMPTION_PATH: &str = "/contrats/42/eau_consos";

fn readings_body() -> String {
    json!([
        {"compteurFroid": true, "ecrelDatrel": "2026-01-01T00:00:00+00:00", "ecrelVal": 100},
        {"compteurFroid": true, "ecrelDatrel": "2026-02-01T00:00:00+00:00", "ecrelVal": "120"}
    ])
    .to_string()
}

async fn stored_entry(entries: &Arc<dyn EntryStore>) -> ConfigEntry {
    let entry = ConfigEntry::new(
        "Contrat 42",
        Some("42".to_string()),
        EntryData {
            username: "u@example.com".to_string(),
            password: "pw".to_string(),
            contract_id: "42".to_string(),
            token: "stale".to_string(),
            trusted_id: "device-1".to_string(),
            price_per_m3: 3.2,
        },
    );
    entries.add(entry.clone()).await.unwrap();
    entry
}

#[tokio::test]
async fn test_valid_token_fetches_directly() {
    let mut server = Server::new_async().await;
    let fetch = server
        .mock("GET", CONSUMPTION_PATH)
        .match_header("authorization", "Bearer stale")
        .with_status(200)
        .with_body(readings_body())
        .create_async()
        .await;
    let login = server
        .mock("POST", "/login")
        .expect(0)
        .create_async()
        .await;

    let entries: Arc<dyn EntryStore> = Arc::new(JsonEntryStore::in_memory());
    let entry = stored_entry(&entries).await;
    let source = ReauthenticatingSource::from_entry(&server.url(), Arc::clone(&entries), &entry).unwrap();

    let readings = source.fetch().await.unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[1].index_m3, Some(120.0));

    fetch.assert_async().await;
    login.assert_async().await;
}

#[tokio::test]
async fn test_expired_token_relogs_and_persists() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", CONSUMPTION_PATH)
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .create_async()
        .await;
    let login = server
        .mock("POST", "/login")
        .match_body(Matcher::PartialJson(json!({
            "username": "u@example.com",
            "password": "pw",
            "data": {"trusted": "device-1"}
        })))
        .with_status(200)
        .with_body(r#"{"token": "fresh"}"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", CONSUMPTION_PATH)
        .match_header("authorization", "Bearer fresh")
        .with_status(200)
        .with_body(readings_body())
        .create_async()
        .await;

    let entries: Arc<dyn EntryStore> = Arc::new(JsonEntryStore::in_memory());
    let entry = stored_entry(&entries).await;
    let source = ReauthenticatingSource::from_entry(&server.url(), Arc::clone(&entries), &entry).unwrap();

    let readings = source.fetch().await.unwrap();
    assert_eq!(readings.len(), 2);
    login.assert_async().await;

    let stored = entries.get(&entry.entry_id).await.unwrap();
    assert_eq!(stored.data.token, "fresh");
    assert_eq!(stored.data.trusted_id, "device-1");
    assert_eq!(stored.data.contract_id, "42");
    assert_eq!(stored.data.price(), Some(3.2));
}

#[tokio::test]
async fn test_relogin_asking_for_2fa_needs_reauth() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", CONSUMPTION_PATH)
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(r#"{"message": "2FA_REQUIRED"}"#)
        .create_async()
        .await;

    let entries: Arc<dyn EntryStore> = Arc::new(JsonEntryStore::in_memory());
    let entry = stored_entry(&entries).await;
    let source = ReauthenticatingSource::from_entry(&server.url(), Arc::clone(&entries), &entry).unwrap();

    let err = source.fetch().await.unwrap_err();
    assert_eq!(err, UpdateFailed::ReauthRequired);
    assert!(err.needs_reauth());

    let stored = entries.get(&entry.entry_id).await.unwrap();
    assert_eq!(stored.data.token, "stale");
}

#[tokio::test]
async fn test_retry_failure_is_api_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", CONSUMPTION_PATH)
        .with_status(500)
        .expect(2)
        .create_async()
        .await;
    server
        .mock("POST", "/login")
        .with_status(200)
        .with_body(r#"{"token": "fresh"}"#)
        .create_async()
        .await;

    let entries: Arc<dyn EntryStore> = Arc::new(JsonEntryStore::in_memory());
    let entry = stored_entry(&entries).await;
    let source = ReauthenticatingSource::from_entry(&server.url(), Arc::clone(&entries), &entry).unwrap();

    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, UpdateFailed::Api(_)));
}

#[tokio::test]
async fn test_login_transport_failure_is_api_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", CONSUMPTION_PATH)
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", "/login")
        .with_status(503)
        .create_async()
        .await;

    let entries: Arc<dyn EntryStore> = Arc::new(JsonEntryStore::in_memory());
    let entry = stored_entry(&entries).await;
    let source = ReauthenticatingSource::from_entry(&server.url(), Arc::clone(&entries), &entry).unwrap();

    let err = source.fetch().await.unwrap_err();
    assert!(matches!(err, UpdateFailed::Api(ref m) if m.contains("503")));
}
