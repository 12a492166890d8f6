use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::config::EnvironmentProfile;

/// Service identity sent to the orchestration service on every call.
pub const SERVICE_NAME: &str = "forgeview-gateway";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned status {0}")]
    Status(StatusCode),
    #[error("upstream unreachable: {0}")]
    Network(String),
}

/// Bounded-timeout client for the MCP orchestration service. Failures are
/// returned as values; callers decide whether to substitute fallback data.
/// There is deliberately no retry here: dashboard reads are safe to serve
/// stale, so retrying live is the caller's call, not the client's.
pub struct UpstreamClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    shared_secret: Option<String>,
}

impl UpstreamClient {
    pub fn new(profile: &EnvironmentProfile) -> Self {
        let http = Client::builder()
            .timeout(profile.upstream_timeout)
            .build()
            .expect("failed to build upstream HTTP client");
        UpstreamClient {
            http,
            base_url: profile.upstream_base_url.clone(),
            timeout: profile.upstream_timeout,
            shared_secret: profile.upstream_shared_secret.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET the given relative path. Timeout, connection failure and non-2xx
    /// statuses all surface as `Err`; this never panics and never hangs past
    /// the configured timeout. Dropping the request on timeout also releases
    /// the in-flight connection.
    pub async fn get(&self, path: &str) -> Result<Value, UpstreamError> {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut request = self.http.get(&url).header("x-service-name", SERVICE_NAME);
        if let Some(secret) = &self.shared_secret {
            request = request.bearer_auth(secret);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(self.timeout)
            } else {
                UpstreamError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))
    }
}
