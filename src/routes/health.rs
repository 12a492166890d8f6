use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::Extension;
use serde_json::json;
use tracing::warn;

use crate::context::RequestContext;
use crate::responses::ApiResponse;
use crate::state::AppState;

/// Liveness: the event loop answered, so the process is alive. No external
/// calls; this must never fail because a dependency is down.
pub async fn liveness(Extension(ctx): Extension<RequestContext>) -> Response {
    ApiResponse::success(&ctx, json!({ "status": "alive" }))
}

/// Readiness: a bounded database connectivity check. A deployment without a
/// database reports `skipped`, which passes — an absent dependency is not a
/// broken one. An unreachable or hanging database reports 503 within the
/// configured probe timeout.
pub async fn readiness(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let database = match &state.db {
        None => "skipped",
        Some(probe) => {
            match tokio::time::timeout(state.profile.readiness_timeout, probe.ping()).await {
                Ok(Ok(())) => "healthy",
                Ok(Err(e)) => {
                    warn!(request_id = %ctx.request_id, error = %e, "readiness database check failed");
                    "unhealthy"
                }
                Err(_) => {
                    warn!(
                        request_id = %ctx.request_id,
                        timeout_ms = state.profile.readiness_timeout.as_millis() as u64,
                        "readiness database check timed out"
                    );
                    "unhealthy"
                }
            }
        }
    };

    if database == "unhealthy" {
        ApiResponse::fail_with_details(
            &ctx,
            StatusCode::SERVICE_UNAVAILABLE,
            "service not ready",
            json!({ "status": "not-ready", "database": database }),
        )
    } else {
        ApiResponse::success(&ctx, json!({ "status": "ready", "database": database }))
    }
}
