use std::collections::HashMap;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use forgeview_gateway::config::EnvironmentProfile;
use forgeview_gateway::routes::build_router;
use forgeview_gateway::AppState;
use httpmock::MockServer;
use serde_json::{json, Value};
use tokio_stream::StreamExt;
use tower::ServiceExt;

const TESTING_ORIGIN: &str = "https://testing-frontend.example";
const ACCESS_TOKEN: &str = "secret-token";

fn testing_profile(upstream_url: &str) -> EnvironmentProfile {
    let vars: HashMap<String, String> = [
        ("APP_ENV", "testing"),
        ("FRONTEND_ORIGIN", TESTING_ORIGIN),
        ("UPSTREAM_URL", upstream_url),
        ("UPSTREAM_TIMEOUT_MS", "500"),
        ("API_ACCESS_TOKEN", ACCESS_TOKEN),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    EnvironmentProfile::resolve(&vars).unwrap()
}

fn testing_state(upstream_url: &str) -> AppState {
    AppState::new(testing_profile(upstream_url), None)
}

fn app(upstream_url: &str) -> Router {
    build_router(testing_state(upstream_url))
}

fn client_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 41000))
}

// The rate limiter keys on the peer address, which `oneshot` does not
// populate; requests carry it explicitly the way a real listener would.
fn with_peer(mut req: Request<Body>) -> Request<Body> {
    req.extensions_mut().insert(ConnectInfo(client_addr()));
    req
}

fn get(uri: &str) -> Request<Body> {
    with_peer(Request::builder().uri(uri).body(Body::empty()).unwrap())
}

fn authed_get(uri: &str) -> Request<Body> {
    with_peer(
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {ACCESS_TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn top_level_keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    keys
}

#[tokio::test]
async fn health_endpoints_answer_without_credentials() {
    for uri in ["/health", "/health/ready"] {
        let res = app("http://127.0.0.1:9").oneshot(get(uri)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK, "{uri} should not require auth");
        let json = body_json(res).await;
        assert_eq!(json["success"], true);
    }
}

#[tokio::test]
async fn readiness_without_database_reports_skipped() {
    let res = app("http://127.0.0.1:9")
        .oneshot(get("/health/ready"))
        .await
        .unwrap();
    let json = body_json(res).await;
    assert_eq!(json["data"]["status"], "ready");
    assert_eq!(json["data"]["database"], "skipped");
}

#[tokio::test]
async fn protected_routes_reject_missing_token() {
    let res = app("http://127.0.0.1:9")
        .oneshot(get("/api/dashboard"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(res).await;
    assert_eq!(top_level_keys(&json), vec!["error", "meta", "success"]);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn live_upstream_data_is_tagged_upstream() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET)
            .path("/api/dashboard/summary");
        then.status(200).json_body(json!({"openSalesOrders": 4}));
    });

    let res = app(&server.base_url())
        .oneshot(authed_get("/api/dashboard"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["meta"]["source"], "upstream");
    assert_eq!(json["data"]["openSalesOrders"], 4);
}

#[tokio::test]
async fn upstream_outage_serves_fallback_not_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(httpmock::Method::GET)
            .path("/api/dashboard/summary");
        then.status(500);
    });

    let res = app(&server.base_url())
        .oneshot(authed_get("/api/dashboard"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(top_level_keys(&json), vec!["data", "meta", "success"]);
    assert_eq!(json["success"], true);
    assert_eq!(json["meta"]["source"], "fallback");
    assert!(json["meta"]["reason"].is_string());
    assert_eq!(json["data"]["synthetic"], true);
}

#[tokio::test]
async fn status_endpoint_is_public_diagnostics() {
    let res = app("http://127.0.0.1:9")
        .oneshot(get("/api/status"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["data"]["environment"], "testing");
    assert_eq!(json["data"]["realtime"]["sse"], 0);
}

#[tokio::test]
async fn unmatched_api_paths_return_envelope_404() {
    let res = app("http://127.0.0.1:9")
        .oneshot(get("/api/no-such-route"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let json = body_json(res).await;
    assert_eq!(top_level_keys(&json), vec!["error", "meta", "success"]);
    assert!(json["meta"]["requestId"].is_string());
}

#[tokio::test]
async fn non_api_paths_fall_through_to_the_spa() {
    let res = app("http://127.0.0.1:9")
        .oneshot(get("/orders/42"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let content_type = res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));
}

#[tokio::test]
async fn security_headers_are_applied() {
    let res = app("http://127.0.0.1:9").oneshot(get("/health")).await.unwrap();
    let headers = res.headers();
    assert!(headers
        .get(header::CONTENT_SECURITY_POLICY)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .starts_with("default-src 'self'"));
    assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    assert_eq!(
        headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn cors_allows_the_testing_frontend_origin() {
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/status")
        .header(header::ORIGIN, TESTING_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let res = app("http://127.0.0.1:9").oneshot(req).await.unwrap();
    assert_eq!(
        res.headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some(TESTING_ORIGIN)
    );
}

#[tokio::test]
async fn cors_rejects_unknown_origins() {
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/status")
        .header(header::ORIGIN, "https://random-attacker.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let res = app("http://127.0.0.1:9").oneshot(req).await.unwrap();
    assert!(res
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn broadcast_validation_failures_list_fields() {
    let req = with_peer(
        Request::builder()
            .method(Method::POST)
            .uri("/api/broadcast")
            .header(header::AUTHORIZATION, format!("Bearer {ACCESS_TOKEN}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"payload": "not-an-object"}).to_string()))
            .unwrap(),
    );
    let res = app("http://127.0.0.1:9").oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let json = body_json(res).await;
    let details = json["error"]["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
}

#[tokio::test]
async fn rate_limiter_guards_api_but_never_health() {
    // One token per minute with a burst of 3: the fourth API call inside the
    // window is limited, while the health surface shares no bucket at all.
    let vars: HashMap<String, String> = [
        ("APP_ENV", "testing"),
        ("FRONTEND_ORIGIN", TESTING_ORIGIN),
        ("UPSTREAM_URL", "http://127.0.0.1:9"),
        ("API_ACCESS_TOKEN", ACCESS_TOKEN),
        ("RATE_LIMITER_MILLISECONDS", "60000"),
        ("RATE_LIMITER_BURST", "3"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let app = build_router(AppState::new(
        EnvironmentProfile::resolve(&vars).unwrap(),
        None,
    ));

    for _ in 0..3 {
        let res = app.clone().oneshot(get("/api/status")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app.clone().oneshot(get("/api/status")).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    // The limited response still passes through the context middleware.
    assert!(res.headers().get("x-request-id").is_some());
    let json = body_json(res).await;
    assert_eq!(top_level_keys(&json), vec!["error", "meta", "success"]);
    assert_eq!(json["success"], false);

    // The same client hammering the health surface is never limited.
    for uri in ["/health", "/health/ready"] {
        for _ in 0..5 {
            let res = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK, "{uri} must not be rate limited");
        }
    }
}

#[tokio::test]
async fn sse_handshake_emits_connected_and_disconnect_unregisters() {
    let state = testing_state("http://127.0.0.1:9");
    let hub = state.hub.clone();
    let router = build_router(state);

    let res = router.oneshot(get("/api/events")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .starts_with("text/event-stream"));

    let mut stream = res.into_body().into_data_stream();
    let first = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
        .await
        .expect("no handshake frame within 1s")
        .expect("stream ended before handshake")
        .expect("body error");
    let first = String::from_utf8_lossy(&first).to_string();
    assert!(first.contains("event: connected"), "got frame: {first}");
    assert!(first.contains("connectionId"));
    assert_eq!(hub.connection_count(), 1);

    // Client disconnect: dropping the body must promptly evict the
    // connection, and a later broadcast reaches nobody.
    drop(stream);
    assert_eq!(hub.connection_count(), 0);
    assert_eq!(hub.broadcast("heartbeat", &json!({})), 0);
}

#[tokio::test]
async fn broadcasts_are_relayed_to_sse_clients() {
    let state = testing_state("http://127.0.0.1:9");
    let hub = state.hub.clone();
    let router = build_router(state);

    let res = router.oneshot(get("/api/events")).await.unwrap();
    let mut stream = res.into_body().into_data_stream();

    // Consume the handshake first.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
        .await
        .unwrap();

    assert_eq!(hub.broadcast("order_updated", &json!({"orderId": 7})), 1);
    let frame = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
        .await
        .expect("no broadcast frame within 1s")
        .unwrap()
        .unwrap();
    let frame = String::from_utf8_lossy(&frame).to_string();
    assert!(frame.contains("event: order_updated"), "got frame: {frame}");
    assert!(frame.contains("\"orderId\":7"));
}
