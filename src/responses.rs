use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::context::RequestContext;

/// Where the data in a response came from. `fallback` marks synthetic
/// substitute data served because the upstream service was unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Upstream,
    Fallback,
    Local,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub request_id: String,
    pub timestamp: String,
    pub source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The one JSON shape every API response uses. Success carries `data`,
/// failure carries `error`; never both.
#[derive(Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: Meta,
}

pub struct ApiResponse;

impl ApiResponse {
    fn meta(ctx: &RequestContext, source: Source, reason: Option<String>) -> Meta {
        Meta {
            request_id: ctx.request_id.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            source,
            reason,
        }
    }

    pub fn success(ctx: &RequestContext, data: Value) -> Response {
        Self::success_from(ctx, Source::Local, None, data)
    }

    pub fn success_from(
        ctx: &RequestContext,
        source: Source,
        reason: Option<String>,
        data: Value,
    ) -> Response {
        (
            StatusCode::OK,
            Json(Envelope {
                success: true,
                data: Some(data),
                error: None,
                meta: Self::meta(ctx, source, reason),
            }),
        )
            .into_response()
    }

    pub fn fail(ctx: &RequestContext, status: StatusCode, message: &str) -> Response {
        Self::fail_inner(ctx, status, message, None)
    }

    pub fn fail_with_details(
        ctx: &RequestContext,
        status: StatusCode,
        message: &str,
        details: Value,
    ) -> Response {
        Self::fail_inner(ctx, status, message, Some(details))
    }

    fn fail_inner(
        ctx: &RequestContext,
        status: StatusCode,
        message: &str,
        details: Option<Value>,
    ) -> Response {
        (
            status,
            Json(Envelope {
                success: false,
                data: None,
                error: Some(ErrorBody {
                    message: message.to_string(),
                    details,
                }),
                meta: Self::meta(ctx, Source::Local, None),
            }),
        )
            .into_response()
    }
}
