// fathom-server/tests/http_api.rs
// ============================================================================
// Module: Fathom Server HTTP API Tests
// Description: End-to-end router tests over a seeded store.
// Purpose: Exercises `spec.md` §6.1 status codes without a bound socket.
// Dependencies: axum, fathom-*, tower
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::http::StatusCode;
use fathom_config::Config;
use fathom_config::ConfigOverrides;
use fathom_config::Preset;
use fathom_core::core::event::Envelope;
use fathom_core::core::event::Event;
use fathom_core::core::event::EventPayload;
use fathom_core::core::event::EventStatus;
use fathom_core::core::event::MetadataMap;
use fathom_core::core::identifiers::RunId;
use fathom_export::Exporter;
use fathom_server::build_router;
use fathom_server::ServerConfig;
use fathom_server::ServerState;
use fathom_store_sqlite::SqliteStore;
use tower::ServiceExt;

fn test_config() -> Config {
    Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load config")
}

fn seeded_store(dir: &std::path::Path) -> (Arc<SqliteStore>, RunId) {
    let store = SqliteStore::open(&dir.join("fathom.db")).expect("open store");
    store.initialize(&test_config()).expect("initialize store");

    let run_id = RunId::new();
    let envelope = |event_id: u64| Envelope {
        event_id,
        run_id: run_id.clone(),
        parent_event_id: None,
        timestamp_ms: 1_700_000_000_000 + i64::try_from(event_id).expect("small id"),
        duration_ms: Some(1),
        status: EventStatus::Ok,
        metadata: MetadataMap::new(),
    };
    let events = vec![
        Event {
            envelope: envelope(0),
            payload: EventPayload::RunStart { name: "http test run".to_owned() },
        },
        Event {
            envelope: envelope(1),
            payload: EventPayload::FinalAnswer { answer: "ok".to_owned() },
        },
    ];
    store.export_batch(&events).expect("seed events");
    (Arc::new(store), run_id)
}

fn connect_info() -> ConnectInfo<SocketAddr> {
    ConnectInfo(([127, 0, 0, 1], 0).into())
}

fn request(path: &str) -> Request<Body> {
    let mut request = Request::builder().uri(path).body(Body::empty()).expect("request");
    request.extensions_mut().insert(connect_info());
    request
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (store, _run_id) = seeded_store(dir.path());
    let state = ServerState::new(store, test_config(), ServerConfig::default());
    let router = build_router(state);

    let response = router.oneshot(request("/health")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn list_runs_finds_the_seeded_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (store, run_id) = seeded_store(dir.path());
    let state = ServerState::new(store, test_config(), ServerConfig::default());
    let router = build_router(state);

    let response = router.oneshot(request("/v1/runs?search=http")).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8(body.to_vec()).expect("utf8");
    assert!(text.contains(run_id.as_str()));
}

#[tokio::test]
async fn get_run_404s_for_an_unknown_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (store, _run_id) = seeded_store(dir.path());
    let state = ServerState::new(store, test_config(), ServerConfig::default());
    let router = build_router(state);

    let response = router.oneshot(request("/v1/runs/does-not-exist")).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_timeline_returns_seeded_events() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (store, run_id) = seeded_store(dir.path());
    let state = ServerState::new(store, test_config(), ServerConfig::default());
    let router = build_router(state);

    let path = format!("/v1/runs/{}/timeline", run_id.as_str());
    let response = router.oneshot(request(&path)).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8(body.to_vec()).expect("utf8");
    assert!(text.contains("run_start"));
    assert!(text.contains("final_answer"));
}

#[tokio::test]
async fn missing_api_key_is_rejected_when_configured() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (store, _run_id) = seeded_store(dir.path());
    let mut config = ServerConfig::default();
    config.api_key = Some("s3cret".to_owned());
    let state = ServerState::new(store, test_config(), config);
    let router = build_router(state);

    let response = router.oneshot(request("/v1/runs")).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn matching_api_key_is_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (store, _run_id) = seeded_store(dir.path());
    let mut config = ServerConfig::default();
    config.api_key = Some("s3cret".to_owned());
    let state = ServerState::new(store, test_config(), config);
    let router = build_router(state);

    let mut req = request("/v1/runs");
    req.headers_mut().insert("x-api-key", "s3cret".parse().expect("header value"));
    let response = router.oneshot(req).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn exceeding_the_rate_limit_yields_429_with_retry_after() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (store, _run_id) = seeded_store(dir.path());
    let mut config = ServerConfig::default();
    config.rate_limit_per_minute = Some(1);
    let state = ServerState::new(store, test_config(), config);
    let router = build_router(state);

    let first = router.clone().oneshot(request("/health")).await.expect("response");
    assert_eq!(first.status(), StatusCode::OK);

    let second = router.oneshot(request("/health")).await.expect("response");
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));
}
