pub mod broadcast;
pub mod dashboard;
pub mod events;
pub mod health;
pub mod status;
pub mod ws;

use axum::extract::{Request, State};
use axum::http::header::{self, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Extension, Router};
use std::sync::Arc;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::config::EnvironmentProfile;
use crate::context::{self, RequestContext};
use crate::responses::ApiResponse;
use crate::state::AppState;

/// Assembles the full HTTP surface. Middleware order is fixed: request-id
/// assignment, access log, security headers, CORS, then routing; the auth
/// delegation layer sits on the protected subrouter only, and the rate
/// limiter on the `/api` subrouter only. The health surface is registered
/// with neither in front of it — orchestrator probes must never fail for
/// lack of credentials or because dashboard polling drained a token bucket.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/dashboard", get(dashboard::summary))
        .route("/api/dashboard/metrics", get(dashboard::production_metrics))
        .route("/api/dashboard/alerts", get(dashboard::alerts))
        .route("/api/broadcast", post(broadcast::publish_event))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(state.profile.rate_limit_ms)
            .burst_size(state.profile.rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                ApiResponse::fail(
                    &RequestContext::new(),
                    StatusCode::TOO_MANY_REQUESTS,
                    "Too many requests. Please wait a moment and try again.",
                )
            })
            .finish()
            .expect("invalid rate limiter configuration"),
    );

    // Background cleanup so the keyed per-IP map does not grow for the life
    // of the process.
    let limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            limiter.retain_recent();
        }
    });

    let api = Router::new()
        .route("/api/status", get(status::status))
        .route("/api/events", get(events::sse_events))
        .merge(protected)
        .layer(GovernorLayer {
            config: governor_conf,
        });

    let cors = cors_layer(&state.profile);

    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/ws", any(ws::ws_upgrade))
        .merge(api)
        .fallback(spa_fallback)
        .with_state(state.clone())
        .layer(cors)
        .layer(middleware::from_fn_with_state(state, security_headers))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(context::attach_context))
}

fn cors_layer(profile: &EnvironmentProfile) -> CorsLayer {
    let allowed = profile.allowed_origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &axum::http::request::Parts| {
                origin
                    .to_str()
                    .map(|o| allowed.iter().any(|a| a == o))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}

async fn security_headers(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut res = next.run(req).await;
    let headers = res.headers_mut();
    headers.insert(header::CONTENT_SECURITY_POLICY, state.csp_header.clone());
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    res
}

/// Served when no SPA build is present (fresh checkout, backend-only dev).
const PLACEHOLDER_INDEX: &str = "<!doctype html>\
<html><head><meta charset=\"utf-8\"><title>Forgeview</title></head>\
<body><div id=\"root\"></div></body></html>";

/// Unmatched `/api/*` paths get a structured 404 envelope; anything else
/// serves the SPA entry document and lets the client-side router take over.
async fn spa_fallback(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    uri: Uri,
) -> Response {
    let path = uri.path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiResponse::fail(&ctx, StatusCode::NOT_FOUND, "no such API route");
    }
    match tokio::fs::read_to_string(&state.profile.spa_index).await {
        Ok(html) => Html(html).into_response(),
        Err(_) => Html(PLACEHOLDER_INDEX.to_string()).into_response(),
    }
}
