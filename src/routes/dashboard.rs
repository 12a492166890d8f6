use axum::extract::State;
use axum::response::Response;
use axum::Extension;
use serde_json::Value;
use tracing::warn;

use crate::context::RequestContext;
use crate::fallback;
use crate::responses::{ApiResponse, Source};
use crate::state::AppState;

/// Every dashboard read goes through here: ask the orchestration service,
/// and when it cannot answer, serve the matching synthetic payload instead of
/// an error page. The provenance is always visible in `meta.source`.
async fn upstream_or_fallback(
    state: &AppState,
    ctx: &RequestContext,
    path: &str,
    fallback: fn() -> Value,
) -> Response {
    match state.upstream.get(path).await {
        Ok(data) => ApiResponse::success_from(ctx, Source::Upstream, None, data),
        Err(err) => {
            warn!(
                request_id = %ctx.request_id,
                %path,
                error = %err,
                "upstream call failed, serving fallback payload"
            );
            ApiResponse::success_from(ctx, Source::Fallback, Some(err.to_string()), fallback())
        }
    }
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    upstream_or_fallback(&state, &ctx, "/api/dashboard/summary", fallback::summary).await
}

pub async fn production_metrics(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    upstream_or_fallback(
        &state,
        &ctx,
        "/api/dashboard/metrics",
        fallback::production_metrics,
    )
    .await
}

pub async fn alerts(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Response {
    upstream_or_fallback(&state, &ctx, "/api/dashboard/alerts", fallback::alerts).await
}
