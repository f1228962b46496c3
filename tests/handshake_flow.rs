//! End-to-end handshake tests against a stubbed Hoda provider.
//!
//! The relay router runs in-process (`oneshot`) with the in-memory correlation
//! store, while `wiremock` plays the provider's start-auth and get-data
//! operations.

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use hoda_relay::{
    api::{self, RedirectEncoding},
    correlation::{CorrelationStore, MemoryStore, StoreError},
    handshake::{Handshake, HandshakeConfig, IntegrityHasher, hash},
    hoda::{HodaClient, HodaConfig},
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    io::Write,
    net::TcpListener,
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;
use url::form_urlencoded;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

const SECRET: &str = "ws-password";
const CLIENT_URL: &str = "https://client.example/done";
const START_AUTH_PATH: &str = "/api/startAuth";
const GATEWAY_PATH: &str = "/gateway";
const GET_DATA_PATH: &str = "/api/getData";

fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}

struct Relay {
    server: MockServer,
    store: Arc<MemoryStore>,
    app: Router,
}

async fn relay(encoding: RedirectEncoding) -> Result<Relay> {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryStore::new());
    let handshake = handshake(&server, store.clone())?;

    Ok(Relay {
        app: api::router(Arc::new(handshake), encoding),
        server,
        store,
    })
}

fn handshake(server: &MockServer, store: Arc<dyn CorrelationStore>) -> Result<Handshake> {
    let hoda = HodaClient::new(
        HodaConfig::new(
            server.uri(),
            START_AUTH_PATH.to_string(),
            GATEWAY_PATH.to_string(),
            GET_DATA_PATH.to_string(),
        )
        .with_timeout(Duration::from_secs(2)),
    )?;

    let config = HandshakeConfig::new("http://relay.test".to_string(), "sp-rest".to_string(), 42)
        .with_correlation_ttl(Duration::from_secs(60));

    Ok(Handshake::new(
        config,
        IntegrityHasher::new(SecretString::from(SECRET.to_string())),
        hoda,
        store,
    ))
}

async fn mount_start_auth(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(START_AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_get_data(server: &MockServer, body: Value) {
    Mock::given(method("POST"))
        .and(path(GET_DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn start_auth_ok() -> Value {
    json!({ "status": "OK", "payload": { "refId": "R1", "spReqId": "S1" } })
}

fn get_data_ok() -> Value {
    json!({
        "status": "OK",
        "payload": {
            "identityAssertion": "never-forwarded",
            "name": "Jane",
            "family": "Doe",
            "nationalId": "0012345678",
            "birthDate": 13_700_101,
            "mobile": "09120000000"
        }
    })
}

fn start_auth_request(body: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method("POST")
        .uri("/start-auth")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

fn callback_request(status: &str, payload: Option<&str>) -> Result<Request<Body>> {
    let mut form = form_urlencoded::Serializer::new(String::new());
    form.append_pair("status", status);
    if let Some(payload) = payload {
        form.append_pair("payload", payload);
    }

    Ok(Request::builder()
        .method("POST")
        .uri("/callback")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.finish()))?)
}

fn callback_payload(sp_req_id: &str) -> String {
    json!({ "authAssertion": "A1", "refId": "R1", "spReqId": sp_req_id }).to_string()
}

async fn json_body(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn form_fields(server: &MockServer, at: &str) -> Result<HashMap<String, String>> {
    let requests = server.received_requests().await.unwrap_or_default();
    let request = requests
        .iter()
        .find(|request| request.url.path() == at)
        .ok_or_else(|| anyhow::anyhow!("no request to {at}"))?;

    Ok(form_urlencoded::parse(&request.body).into_owned().collect())
}

#[tokio::test]
async fn start_auth_returns_gateway_redirect_and_stores_record() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::Component).await?;
    mount_start_auth(&relay.server, start_auth_ok()).await;

    let response = relay
        .app
        .clone()
        .oneshot(start_auth_request(&json!({ "callBackUrl": CLIENT_URL }).to_string())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["payload"]["refId"], "R1");

    let expected_redirect = format!(
        "{}{GATEWAY_PATH}?hashedData={}&refId=R1",
        relay.server.uri(),
        hash(SECRET, &["R1", "S1"])
    );
    assert_eq!(body["redirectUrl"], expected_redirect.as_str());

    assert_eq!(relay.store.get("S1").await?, Some(CLIENT_URL.to_string()));

    let sent = form_fields(&relay.server, START_AUTH_PATH).await?;
    let sp_req_id = sent.get("spReqId").cloned().unwrap_or_default();
    assert_eq!(sp_req_id.len(), 36, "spReqId should be a UUID: {sp_req_id}");
    assert_eq!(sent.get("spRestId").map(String::as_str), Some("sp-rest"));
    assert_eq!(sent.get("serviceId").map(String::as_str), Some("42"));
    assert_eq!(
        sent.get("callBackUrl").map(String::as_str),
        Some("http_//relay.test/callback")
    );
    assert_eq!(sent.get("hashedData"), Some(&hash(SECRET, &[sp_req_id.as_str()])));

    Ok(())
}

#[tokio::test]
async fn rejected_start_auth_passes_through_without_record() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::Component).await?;
    mount_start_auth(
        &relay.server,
        json!({ "status": "WRONG_CREDENTIALS", "errors": "bad password" }),
    )
    .await;
    mount_get_data(&relay.server, get_data_ok()).await;

    let response = relay
        .app
        .clone()
        .oneshot(start_auth_request(&json!({ "callBackUrl": CLIENT_URL }).to_string())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(
        body,
        json!({ "status": "WRONG_CREDENTIALS", "errors": "bad password" })
    );
    assert!(relay.store.is_empty().await);

    // Nothing was stored, so even a well-formed callback cannot resolve.
    let response = relay
        .app
        .clone()
        .oneshot(callback_request("OK", Some(&callback_payload("S1")))?)
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await?["error"], "correlation_miss");

    Ok(())
}

#[tokio::test]
async fn callback_redirects_once_with_verified_fields() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::Component).await?;
    mount_start_auth(&relay.server, start_auth_ok()).await;
    mount_get_data(&relay.server, get_data_ok()).await;

    let response = relay
        .app
        .clone()
        .oneshot(start_auth_request(&json!({ "callBackUrl": CLIENT_URL }).to_string())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = relay
        .app
        .clone()
        .oneshot(callback_request("OK", Some(&callback_payload("S1")))?)
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    let target = "https://client.example/done?name=Jane&family=Doe&nationalId=0012345678&birthDate=13700101&mobile=09120000000";
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert_eq!(location, RedirectEncoding::Component.apply(target));
    assert!(!location.contains("never-forwarded"));

    let sent = form_fields(&relay.server, GET_DATA_PATH).await?;
    assert_eq!(sent.get("authAssertion").map(String::as_str), Some("A1"));
    assert_eq!(sent.get("refId").map(String::as_str), Some("R1"));
    assert_eq!(sent.get("hashedData"), Some(&hash(SECRET, &["R1", "S1"])));

    // Replay: the record was consumed by the first callback.
    let response = relay
        .app
        .clone()
        .oneshot(callback_request("OK", Some(&callback_payload("S1")))?)
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await?["error"], "correlation_miss");

    Ok(())
}

#[tokio::test]
async fn plain_redirect_encoding_uses_target_as_is() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::None).await?;
    mount_get_data(
        &relay.server,
        json!({ "status": "OK", "payload": { "name": "Jane", "family": "Doe" } }),
    )
    .await;
    relay
        .store
        .put("S9", "https://client.example/done?app=1", Duration::from_secs(60))
        .await?;

    let response = relay
        .app
        .clone()
        .oneshot(callback_request("OK", Some(&callback_payload("S9")))?)
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("https://client.example/done?app=1&name=Jane&family=Doe")
    );

    Ok(())
}

#[tokio::test]
async fn unknown_session_is_a_correlation_miss() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::Component).await?;
    mount_get_data(&relay.server, get_data_ok()).await;
    relay
        .store
        .put("S1", CLIENT_URL, Duration::from_secs(60))
        .await?;

    let response = relay
        .app
        .clone()
        .oneshot(callback_request("OK", Some(&callback_payload("S-unknown")))?)
        .await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await?;
    assert_eq!(body["error"], "correlation_miss");
    // The session id is not echoed back to the caller.
    assert!(!body.to_string().contains("S-unknown"));
    assert_eq!(relay.store.len().await, 1);

    Ok(())
}

#[tokio::test]
async fn callback_failures_map_to_status_codes() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::Component).await?;
    mount_get_data(
        &relay.server,
        json!({ "status": "EXPIRE", "errors": "assertion expired" }),
    )
    .await;
    relay
        .store
        .put("S1", CLIENT_URL, Duration::from_secs(60))
        .await?;

    // Non-OK status from the provider on the callback itself.
    let response = relay
        .app
        .clone()
        .oneshot(callback_request("ACCESS_DENIED", None)?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await?["error"], "upstream_rejected");

    // OK status but unusable payload.
    for payload in [None, Some("{not json"), Some(r#"{"authAssertion":"A1","refId":"R1"}"#)] {
        let response = relay
            .app
            .clone()
            .oneshot(callback_request("OK", payload)?)
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload:?}");
        assert_eq!(json_body(response).await?["error"], "validation_failed");
    }

    // Missing form entirely.
    let response = relay
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/callback")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // get-data refused: the record is left to expire.
    let response = relay
        .app
        .clone()
        .oneshot(callback_request("OK", Some(&callback_payload("S1")))?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await?["error"], "upstream_rejected");
    assert_eq!(relay.store.get("S1").await?, Some(CLIENT_URL.to_string()));

    Ok(())
}

#[tokio::test]
async fn start_auth_rejects_bad_input() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::Component).await?;
    mount_start_auth(&relay.server, start_auth_ok()).await;

    for body in [
        json!({ "callBackUrl": "ftp://client.example/done" }).to_string(),
        json!({ "callBackUrl": "not a url" }).to_string(),
        json!({ "somethingElse": CLIENT_URL }).to_string(),
        "{not json".to_string(),
    ] {
        let response = relay.app.clone().oneshot(start_auth_request(&body)?).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(json_body(response).await?["error"], "validation_failed");
    }

    // Validation happens before the provider is contacted.
    let requests = relay.server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());

    Ok(())
}

#[tokio::test]
async fn unreachable_provider_is_bad_gateway() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    // No mocks mounted: the provider answers 404 with an empty body.
    let relay = relay(RedirectEncoding::Component).await?;

    let response = relay
        .app
        .clone()
        .oneshot(start_auth_request(&json!({ "callBackUrl": CLIENT_URL }).to_string())?)
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await?["error"], "transport_failure");
    assert!(relay.store.is_empty().await);

    Ok(())
}

struct FailingStore;

#[async_trait]
impl CorrelationStore for FailingStore {
    async fn put(&self, _: &str, _: &str, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::Config("store offline".to_string()))
    }

    async fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Config("store offline".to_string()))
    }

    async fn take(&self, _: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Config("store offline".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::Config("store offline".to_string()))
    }
}

#[tokio::test]
async fn store_failure_keeps_redirect_but_fails_callback_and_health() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let server = MockServer::start().await;
    mount_start_auth(&server, start_auth_ok()).await;
    mount_get_data(&server, get_data_ok()).await;

    let app = api::router(
        Arc::new(handshake(&server, Arc::new(FailingStore))?),
        RedirectEncoding::Component,
    );

    let response = app
        .clone()
        .oneshot(start_auth_request(&json!({ "callBackUrl": CLIENT_URL }).to_string())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json_body(response).await?["redirectUrl"].is_string());

    let response = app
        .clone()
        .oneshot(callback_request("OK", Some(&callback_payload("S1")))?)
        .await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await?["error"], "transport_failure");

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await?["store"], "error");

    Ok(())
}

#[tokio::test]
async fn health_reports_build_and_store() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::Component).await?;

    let response = relay
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));
    let body = json_body(response).await?;
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["store"], "ok");

    let response = relay
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())?,
        )
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|value| value.to_str().ok()),
        Some("req-123")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert!(bytes.is_empty());

    Ok(())
}

#[tokio::test]
async fn callback_url_is_stored_in_parsed_form() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let relay = relay(RedirectEncoding::None).await?;
    mount_start_auth(&relay.server, start_auth_ok()).await;
    mount_get_data(
        &relay.server,
        json!({ "status": "OK", "payload": { "name": "Jane" } }),
    )
    .await;

    let response = relay
        .app
        .clone()
        .oneshot(start_auth_request(
            &json!({ "callBackUrl": "https://client.exa\nmple/do\tne" }).to_string(),
        )?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(relay.store.get("S1").await?, Some(CLIENT_URL.to_string()));

    let response = relay
        .app
        .clone()
        .oneshot(callback_request("OK", Some(&callback_payload("S1")))?)
        .await?;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("https://client.example/done?name=Jane")
    );

    Ok(())
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        self.0
            .lock()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
            .unwrap_or_default()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(mut bytes) = self.0.lock() {
            bytes.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn provider_failures_during_start_auth_are_aborted() -> Result<()> {
    if !can_bind_localhost() {
        eprintln!("Skipping test: cannot bind localhost");
        return Ok(());
    }
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    // OK without payload.
    let without_payload = relay(RedirectEncoding::Component).await?;
    mount_start_auth(&without_payload.server, json!({ "status": "OK" })).await;
    let response = without_payload
        .app
        .clone()
        .oneshot(start_auth_request(&json!({ "callBackUrl": CLIENT_URL }).to_string())?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // Nothing mounted: the provider body does not decode.
    let undecodable = relay(RedirectEncoding::Component).await?;
    let response = undecodable
        .app
        .clone()
        .oneshot(start_auth_request(&json!({ "callBackUrl": CLIENT_URL }).to_string())?)
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let output = logs.contents();
    assert_eq!(output.matches("state=ABORTED").count(), 2, "{output}");
    assert!(!output.contains("state=REJECTED"), "{output}");

    Ok(())
}
