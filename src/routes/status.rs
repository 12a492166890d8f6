use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use chrono::Utc;
use serde_json::json;

use crate::context::RequestContext;
use crate::responses::ApiResponse;
use crate::state::AppState;

/// Unauthenticated diagnostic snapshot: which deployment this is, how long it
/// has been up and how many realtime clients are attached.
pub async fn status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    let (sse, ws) = state.hub.counts_by_transport();
    let uptime_seconds = (Utc::now() - state.started_at).num_seconds();
    ApiResponse::success(
        &ctx,
        json!({
            "environment": state.profile.environment.as_str(),
            "uptimeSeconds": uptime_seconds,
            "realtime": { "sse": sse, "ws": ws },
            "upstream": { "baseUrl": state.upstream.base_url() }
        }),
    )
}
