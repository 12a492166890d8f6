use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::context::RequestContext;
use crate::responses::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub event: Option<String>,
    pub payload: Option<Value>,
}

const MAX_EVENT_NAME_LEN: usize = 64;

fn valid_event_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_EVENT_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Pushes an event to every connected realtime client. Validation failures
/// list each violated field in `error.details`, never silently coerced.
pub async fn publish_event(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return ApiResponse::fail_with_details(
                &ctx,
                StatusCode::BAD_REQUEST,
                "request body must be JSON",
                json!([rejection.body_text()]),
            );
        }
    };

    let mut violations: Vec<String> = Vec::new();
    match body.event.as_deref() {
        None => violations.push("event is required".to_string()),
        Some(name) if !valid_event_name(name) => violations.push(format!(
            "event must be 1-{MAX_EVENT_NAME_LEN} characters of [A-Za-z0-9_.-]"
        )),
        Some(_) => {}
    }
    match &body.payload {
        None => violations.push("payload is required".to_string()),
        Some(value) if !value.is_object() => {
            violations.push("payload must be a JSON object".to_string())
        }
        Some(_) => {}
    }
    if !violations.is_empty() {
        return ApiResponse::fail_with_details(
            &ctx,
            StatusCode::BAD_REQUEST,
            "invalid broadcast request",
            json!(violations),
        );
    }

    let event = body.event.unwrap_or_default();
    let payload = body.payload.unwrap_or_else(|| json!({}));
    let delivered = state.hub.broadcast(&event, &payload);
    info!(request_id = %ctx.request_id, %event, delivered, "broadcast published");
    ApiResponse::success(&ctx, json!({ "event": event, "delivered": delivered }))
}
