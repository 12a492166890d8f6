use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Per-request correlation data. Created at the top of the middleware chain,
/// read by the envelope builder and the access log.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext {
            request_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Outermost middleware: assigns the request id, runs the rest of the chain,
/// echoes the id back as `x-request-id` and emits one access-log line.
pub async fn attach_context(mut req: Request, next: Next) -> Response {
    let ctx = RequestContext::new();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ctx.clone());

    let mut res = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        res.headers_mut().insert("x-request-id", value);
    }
    let elapsed_ms = (Utc::now() - ctx.started_at).num_milliseconds();
    tracing::info!(
        request_id = %ctx.request_id,
        %method,
        %path,
        status = res.status().as_u16(),
        elapsed_ms,
        "request completed"
    );
    res
}
