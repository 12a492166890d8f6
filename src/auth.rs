use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::context::RequestContext;
use crate::responses::ApiResponse;
use crate::state::AppState;

/// Attached to the request by `require_auth` for downstream handlers.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub subject: String,
}

/// Stand-in for the external authentication collaborator: a bearer
/// shared-secret check. Mounted on protected routes only, never ahead of the
/// health surface. Failures are 401 envelopes, compatible with the shape the
/// real collaborator must produce.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    let expected = match state.profile.api_access_token.as_deref() {
        Some(token) => token,
        // No token configured: auth is delegated entirely to the deployment
        // (reverse proxy) outside production.
        None if !state.profile.environment.is_production() => {
            req.extensions_mut().insert(AuthenticatedUser {
                subject: "anonymous".to_string(),
            });
            return next.run(req).await;
        }
        None => {
            warn!(request_id = %ctx.request_id, "API_ACCESS_TOKEN not configured in production");
            return ApiResponse::fail(&ctx, StatusCode::UNAUTHORIZED, "authentication required");
        }
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => {
            req.extensions_mut().insert(AuthenticatedUser {
                subject: "api-token".to_string(),
            });
            next.run(req).await
        }
        _ => ApiResponse::fail(
            &ctx,
            StatusCode::UNAUTHORIZED,
            "invalid or missing access token",
        ),
    }
}
