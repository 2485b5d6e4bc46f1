#![allow(clippy::unwrap_used)]
// Integration tests for `ApiClient` dispatch and session handling using wiremock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skybell_api::{
    ApiClient, AuthCache, Clock, Credentials, Endpoints, Error, MemoryBlobStore, Payload,
    Request, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

const EMAIL: &str = "user@example.com";
const PASSWORD: &str = "hunter2";

fn endpoints(server: &MockServer) -> Endpoints {
    Endpoints::parse(&format!("{}/api/v5/", server.uri())).unwrap()
}

fn credentials() -> Credentials {
    Credentials::new(EMAIL, SecretString::from(PASSWORD.to_string()))
}

async fn setup() -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let client = ApiClient::with_client(
        reqwest::Client::new(),
        endpoints(&server),
        Arc::new(AuthCache::disabled()),
    )
    .with_credentials(credentials());
    (server, client)
}

async fn setup_with_timeout(timeout: Duration) -> (MockServer, ApiClient) {
    let server = MockServer::start().await;
    let transport = TransportConfig::default().with_timeout(timeout);
    let client = ApiClient::new(
        endpoints(&server),
        Arc::new(AuthCache::disabled()),
        &transport,
    )
    .unwrap()
    .with_credentials(credentials());
    (server, client)
}

fn login_body() -> Value {
    json!({
        "data": {
            "AuthenticationResult": {
                "AccessToken": "superlongkey",
                "RefreshToken": "refreshkey",
                "TokenType": "Bearer",
                "ExpiresIn": 3600
            }
        }
    })
}

async fn mount_login(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v5/login/"))
        .and(body_json(json!({ "username": EMAIL, "password": PASSWORD })))
        .respond_with(ResponseTemplate::new(200).set_body_json(login_body()))
        .expect(expected)
        .mount(server)
        .await;
}

/// A clock the test moves by hand.
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Utc::now())))
    }

    fn advance(&self, by: TimeDelta) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

async fn setup_with_clock(clock: Arc<ManualClock>) -> (MockServer, ApiClient) {
    let (server, client) = setup().await;
    (server, client.with_clock(clock))
}

async fn mount_token(server: &MockServer, status: u16, expected: u64) {
    Mock::given(method("PUT"))
        .and(path("/api/v5/token/"))
        .and(body_json(json!({ "refresh_token": "refreshkey" })))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "data": { "AccessToken": "newkey", "ExpiresIn": 3600 }
        })))
        .expect(expected)
        .mount(server)
        .await;
}

fn devices_body() -> Value {
    json!({ "data": { "rows": [{ "device_id": "dev1", "name": "Front Door" }] } })
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_login_stores_material_with_future_expiration() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    assert!(client.login(None, None).await.unwrap());

    let auth = client.cache().authentication().await;
    assert!(!auth.is_empty());
    assert_eq!(auth.access_token.unwrap().expose_secret(), "superlongkey");
    assert_eq!(auth.token_type.as_deref(), Some("Bearer"));
    assert_eq!(client.session_refresh_period().await, 3600);
    assert!(auth.expiration.unwrap() > Utc::now());
}

#[tokio::test]
async fn test_login_requires_credentials() {
    let server = MockServer::start().await;
    let client = ApiClient::with_client(
        reqwest::Client::new(),
        endpoints(&server),
        Arc::new(AuthCache::disabled()),
    );

    let result = client.login(Some(EMAIL), None).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_forbidden_is_authentication_failure() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v5/login/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "nope" })))
        .mount(&server)
        .await;

    let result = client.login(None, None).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(client.cache().authentication().await.is_empty());
}

#[tokio::test]
async fn test_login_server_error_returns_false() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v5/login/"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    assert!(!client.login(None, None).await.unwrap());
}

#[tokio::test]
async fn test_logout_clears_session_and_releases_client() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    client.login(None, None).await.unwrap();
    assert!(client.logout().await);
    assert!(client.cache().authentication().await.is_empty());
    assert!(!client.is_open());

    // Nothing can reach the server any more.
    assert!(!client.login(None, None).await.unwrap());
    // Logging out twice is still a success.
    assert!(client.logout().await);
}

#[tokio::test]
async fn test_refresh_merges_and_keeps_refresh_token() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("PUT"))
        .and(path("/api/v5/token/"))
        .and(body_json(json!({ "refresh_token": "refreshkey" })))
        .and(header("authorization", "Bearer superlongkey"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "AccessToken": "newkey", "ExpiresIn": 7200 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.login(None, None).await.unwrap();
    assert!(client.refresh().await.unwrap());

    let auth = client.cache().authentication().await;
    assert_eq!(auth.access_token.unwrap().expose_secret(), "newkey");
    assert_eq!(auth.refresh_token.unwrap().expose_secret(), "refreshkey");
    assert_eq!(auth.token_type.as_deref(), Some("Bearer"));
    assert_eq!(auth.expires_in, Some(7200));
}

#[tokio::test]
async fn test_refresh_without_session_fails() {
    let (_server, client) = setup().await;
    let result = client.refresh().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_refresh_failure_returns_false() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("PUT"))
        .and(path("/api/v5/token/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    client.login(None, None).await.unwrap();
    assert!(!client.refresh().await.unwrap());
    // The old session is untouched.
    assert!(!client.cache().authentication().await.is_empty());
}

#[tokio::test]
async fn test_login_is_persisted_to_blob_store() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryBlobStore::new());
    let cache = Arc::new(AuthCache::new(store.clone(), "cache.json"));
    let client = ApiClient::with_client(reqwest::Client::new(), endpoints(&server), cache)
        .with_credentials(credentials());
    mount_login(&server, 1).await;

    client.login(None, None).await.unwrap();

    let stored: Value =
        serde_json::from_slice(&store.get(std::path::Path::new("cache.json")).unwrap()).unwrap();
    assert_eq!(
        stored["AuthenticationResult"]["AccessToken"],
        json!("superlongkey")
    );
    assert!(stored["AuthenticationResult"]["ExpirationDate"].is_string());
}

// ── Dispatch tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_first_request_logs_in_implicitly() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v5/devices/"))
        .and(header("authorization", "Bearer superlongkey"))
        .and(header("x-skybell-app", "1.238.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .expect(2)
        .mount(&server)
        .await;

    let first = client.list_devices().await.unwrap();
    assert_eq!(first["rows"][0]["device_id"], json!("dev1"));
    // Session already established: no second login.
    client.list_devices().await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_clears_session_then_next_call_logs_in_once() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/v5/user/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("expired"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v5/devices/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.get_user().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(client.cache().authentication().await.is_empty());

    client.list_devices().await.unwrap();
    assert!(!client.cache().authentication().await.is_empty());
}

#[tokio::test]
async fn test_status_classification() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    for (status, device) in [(403, "gone403"), (404, "gone404"), (400, "bad"), (502, "boom")] {
        Mock::given(method("GET"))
            .and(path(format!("/api/v5/devices/{device}/")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    assert!(matches!(
        client.get_device("gone403").await,
        Err(Error::UnknownResource { .. })
    ));
    assert!(matches!(
        client.get_device("gone404").await,
        Err(Error::UnknownResource { .. })
    ));
    assert!(matches!(
        client.get_device("bad").await,
        Err(Error::BadRequest { .. })
    ));
    let err = client.get_device("boom").await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.status(), Some(502));

    // A 403 off the login endpoint does not end the session.
    assert!(!client.cache().authentication().await.is_empty());
}

#[tokio::test]
async fn test_ensure_fresh_keeps_live_session() {
    let clock = ManualClock::new();
    let (server, client) = setup_with_clock(clock.clone()).await;
    mount_login(&server, 1).await;
    mount_token(&server, 200, 0).await;

    assert!(client.login(None, None).await.unwrap());
    clock.advance(TimeDelta::minutes(5));

    assert!(client.ensure_fresh().await.unwrap());
    let auth = client.cache().authentication().await;
    assert_eq!(auth.access_token.unwrap().expose_secret(), "superlongkey");
}

#[tokio::test]
async fn test_ensure_fresh_refreshes_expired_session() {
    let clock = ManualClock::new();
    let (server, client) = setup_with_clock(clock.clone()).await;
    mount_login(&server, 1).await;
    mount_token(&server, 200, 1).await;

    assert!(client.login(None, None).await.unwrap());
    let first_expiration = client.session_refresh_timestamp().await.unwrap();
    clock.advance(TimeDelta::hours(2));

    assert!(client.ensure_fresh().await.unwrap());
    let auth = client.cache().authentication().await;
    assert_eq!(auth.access_token.unwrap().expose_secret(), "newkey");
    // Fields the refresh response omits are kept.
    assert_eq!(auth.refresh_token.unwrap().expose_secret(), "refreshkey");
    assert!(auth.expiration.unwrap() > first_expiration);
}

#[tokio::test]
async fn test_ensure_fresh_logs_in_when_refresh_fails() {
    let clock = ManualClock::new();
    let (server, client) = setup_with_clock(clock.clone()).await;
    mount_login(&server, 2).await;
    mount_token(&server, 500, 1).await;

    assert!(client.login(None, None).await.unwrap());
    clock.advance(TimeDelta::hours(2));

    assert!(client.ensure_fresh().await.unwrap());
    let auth = client.cache().authentication().await;
    assert_eq!(auth.access_token.as_ref().unwrap().expose_secret(), "superlongkey");
    assert!(!auth.is_expired(clock.now()));
}

#[tokio::test]
async fn test_unreadable_success_body_is_not_resent() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/v5/devices/dev1/settings/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string("{\"data\": {\"led_intensity\""),
        )
        .expect(1)
        .mount(&server)
        .await;

    let url = client.endpoints().device_settings("dev1").unwrap();
    let err = client
        .send(Request::post(url, json!({ "led_intensity": 50 })))
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::Deserialization { .. }),
        "expected Deserialization error, got: {err:?}"
    );
    assert!(!err.is_connection_failure());
}

#[tokio::test]
async fn test_connection_failure_then_success_on_retry() {
    let (server, client) = setup_with_timeout(Duration::from_millis(300)).await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/v5/devices/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(devices_body())
                .set_delay(Duration::from_secs(2)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v5/devices/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .with_priority(2)
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();
    assert_eq!(devices["rows"][0]["name"], json!("Front Door"));
}

#[tokio::test]
async fn test_connection_failure_twice_surfaces_transport_error() {
    let (server, client) = setup_with_timeout(Duration::from_millis(300)).await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/api/v5/devices/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(2)
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(err.is_connection_failure(), "expected transport error, got: {err:?}");
}

#[tokio::test]
async fn test_no_retry_when_disabled() {
    let (server, client) = setup_with_timeout(Duration::from_millis(300)).await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v5/user/"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&server)
        .await;

    let url = client.endpoints().user().unwrap();
    let err = client.send_with(Request::get(url), false).await.unwrap_err();
    assert!(err.is_connection_failure());
}

#[tokio::test]
async fn test_non_json_body_is_returned_raw() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v5/activity/act1/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(vec![0u8, 1, 2, 3]),
        )
        .mount(&server)
        .await;

    let url = client.endpoints().activity("act1").unwrap();
    let payload = client.send(Request::get(url)).await.unwrap();
    assert_eq!(payload, Payload::Bytes(vec![0u8, 1, 2, 3].into()));
}

#[tokio::test]
async fn test_json_without_envelope_is_returned_as_is() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/api/v5/activity"))
        .and(query_param("device_id", "dev1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rows": [] })))
        .mount(&server)
        .await;

    assert_eq!(
        client.list_activities("dev1").await.unwrap(),
        json!({ "rows": [] })
    );
}

#[tokio::test]
async fn test_foreign_host_gets_no_auth_header() {
    let (server, client) = setup().await;
    let storage = MockServer::start().await;
    mount_login(&server, 1).await;
    client.login(None, None).await.unwrap();

    Mock::given(method("GET"))
        .and(path("/clip.mp4"))
        .and(|req: &wiremock::Request| !req.headers.contains_key("authorization"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "video/mp4")
                .set_body_bytes(b"mp4".to_vec()),
        )
        .expect(1)
        .mount(&storage)
        .await;

    let bytes = client
        .download(&format!("{}/clip.mp4", storage.uri()))
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"mp4");
}
