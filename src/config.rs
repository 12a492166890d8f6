use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set when running as production")]
    MissingProductionVar(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Which of the three parallel deployments this process is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Everything the gateway derives from its environment, resolved exactly once
/// at startup and passed to components explicitly. No other module reads
/// process environment variables.
#[derive(Debug, Clone)]
pub struct EnvironmentProfile {
    pub environment: Environment,
    pub database_url: Option<String>,
    pub allowed_origins: Vec<String>,
    pub csp_directives: Vec<(String, Vec<String>)>,
    pub upstream_base_url: String,
    pub upstream_timeout: Duration,
    pub upstream_shared_secret: Option<String>,
    pub api_access_token: Option<String>,
    pub port: u16,
    pub readiness_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub shutdown_grace: Duration,
    pub rate_limit_ms: u64,
    pub rate_limit_burst: u32,
    pub spa_index: String,
}

const LOCALHOST_ORIGINS: &[&str] = &["http://localhost:5173", "http://localhost:3000"];

impl EnvironmentProfile {
    /// Loads `.env` (development convenience), snapshots the process
    /// environment and resolves it. Called once from `main`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::resolve(&vars)
    }

    /// Pure resolution from a variable map. A missing required value in
    /// production is a hard error; the caller must not bind a listener.
    pub fn resolve(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let environment = resolve_environment(vars)?;

        let database_url = non_empty(vars, "DATABASE_URL");
        if environment.is_production() && database_url.is_none() {
            return Err(ConfigError::MissingProductionVar("DATABASE_URL"));
        }

        let frontend_origin = match non_empty(vars, "FRONTEND_ORIGIN") {
            Some(origin) => origin,
            None if environment.is_production() => {
                return Err(ConfigError::MissingProductionVar("FRONTEND_ORIGIN"));
            }
            None => "http://localhost:5173".to_string(),
        };

        let mut allowed_origins = vec![normalize_origin(&frontend_origin)];
        if let Some(extra) = non_empty(vars, "EXTRA_ALLOWED_ORIGINS") {
            for origin in extra.split(',') {
                let origin = origin.trim();
                if !origin.is_empty() {
                    allowed_origins.push(normalize_origin(origin));
                }
            }
        }
        if !environment.is_production() {
            for origin in LOCALHOST_ORIGINS {
                allowed_origins.push((*origin).to_string());
            }
        }
        dedup_preserving(&mut allowed_origins);

        let upstream_base_url = non_empty(vars, "UPSTREAM_URL")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| "http://localhost:3001".to_string());
        let auth_origin = non_empty(vars, "AUTH_ORIGIN").map(|o| normalize_origin(&o));
        let csp_directives = build_csp(&upstream_base_url, auth_origin.as_deref());

        Ok(EnvironmentProfile {
            environment,
            database_url,
            allowed_origins,
            csp_directives,
            upstream_base_url,
            upstream_timeout: Duration::from_millis(parse_var(
                vars,
                "UPSTREAM_TIMEOUT_MS",
                8_000u64,
            )?),
            upstream_shared_secret: non_empty(vars, "UPSTREAM_SHARED_SECRET"),
            api_access_token: non_empty(vars, "API_ACCESS_TOKEN"),
            port: parse_var(vars, "PORT", 3000u16)?,
            readiness_timeout: Duration::from_millis(parse_var(
                vars,
                "READINESS_TIMEOUT_MS",
                2_000u64,
            )?),
            heartbeat_interval: Duration::from_secs(parse_var(vars, "HEARTBEAT_SECONDS", 30u64)?),
            shutdown_grace: Duration::from_secs(parse_var(vars, "SHUTDOWN_GRACE_SECONDS", 10u64)?),
            rate_limit_ms: parse_var(vars, "RATE_LIMITER_MILLISECONDS", 200u64)?,
            rate_limit_burst: parse_var(vars, "RATE_LIMITER_BURST", 20u32)?,
            spa_index: non_empty(vars, "SPA_DIST")
                .map(|d| format!("{}/index.html", d.trim_end_matches('/')))
                .unwrap_or_else(|| "dist/index.html".to_string()),
        })
    }

    /// Renders the Content-Security-Policy header value.
    pub fn csp_header(&self) -> String {
        self.csp_directives
            .iter()
            .map(|(name, sources)| format!("{} {}", name, sources.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == origin)
    }
}

/// Branch variable wins over the generic environment variable; anything
/// unrecognised lands in development rather than silently in production.
fn resolve_environment(vars: &HashMap<String, String>) -> Result<Environment, ConfigError> {
    if let Some(branch) = non_empty(vars, "DEPLOY_BRANCH") {
        return Ok(match branch.as_str() {
            "main" | "production" => Environment::Production,
            "testing" | "staging" => Environment::Testing,
            _ => Environment::Development,
        });
    }
    match non_empty(vars, "APP_ENV") {
        None => Ok(Environment::Development),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "testing" => Ok(Environment::Testing),
            "development" => Ok(Environment::Development),
            _ => Err(ConfigError::InvalidValue {
                name: "APP_ENV",
                value,
            }),
        },
    }
}

fn build_csp(upstream_base_url: &str, auth_origin: Option<&str>) -> Vec<(String, Vec<String>)> {
    let upstream_origin = normalize_origin(upstream_base_url);
    let upstream_ws = upstream_origin
        .replacen("https://", "wss://", 1)
        .replacen("http://", "ws://", 1);

    let mut connect_src = vec!["'self'".to_string(), upstream_origin, upstream_ws];
    if let Some(auth) = auth_origin {
        connect_src.push(auth.to_string());
    }

    vec![
        ("default-src".into(), vec!["'self'".into()]),
        ("script-src".into(), vec!["'self'".into()]),
        (
            "style-src".into(),
            vec!["'self'".into(), "'unsafe-inline'".into()],
        ),
        ("img-src".into(), vec!["'self'".into(), "data:".into()]),
        ("connect-src".into(), connect_src),
        ("frame-ancestors".into(), vec!["'none'".into()]),
    ]
}

fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match non_empty(vars, name) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            name,
            value,
        }),
    }
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_string()
}

fn dedup_preserving(origins: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    origins.retain(|origin| seen.insert(origin.clone()));
}
