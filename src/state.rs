use std::sync::Arc;

use axum::http::HeaderValue;
use chrono::{DateTime, Utc};

use crate::config::EnvironmentProfile;
use crate::db::DatabaseProbe;
use crate::realtime::RealtimeHub;
use crate::upstream::UpstreamClient;

#[derive(Clone)]
pub struct AppState {
    pub profile: Arc<EnvironmentProfile>,
    pub db: Option<Arc<dyn DatabaseProbe>>,
    pub upstream: Arc<UpstreamClient>,
    pub hub: Arc<RealtimeHub>,
    pub csp_header: HeaderValue,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(profile: EnvironmentProfile, db: Option<Arc<dyn DatabaseProbe>>) -> Self {
        let upstream = Arc::new(UpstreamClient::new(&profile));
        let csp_header = HeaderValue::from_str(&profile.csp_header())
            .unwrap_or_else(|_| HeaderValue::from_static("default-src 'self'"));
        AppState {
            profile: Arc::new(profile),
            db,
            upstream,
            hub: Arc::new(RealtimeHub::new()),
            csp_header,
            started_at: Utc::now(),
        }
    }
}
