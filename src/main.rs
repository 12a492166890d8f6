use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use forgeview_gateway::config::EnvironmentProfile;
use forgeview_gateway::db::{DatabaseProbe, PgProbe};
use forgeview_gateway::routes;
use forgeview_gateway::shutdown::{self, ShutdownCoordinator};
use forgeview_gateway::{realtime, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // A missing required value is fatal: refuse to bind rather than start
    // against an undefined database target.
    let profile = match EnvironmentProfile::from_env() {
        Ok(profile) => profile,
        Err(err) => {
            eprintln!("fatal configuration error: {err}");
            std::process::exit(1);
        }
    };
    info!(
        environment = profile.environment.as_str(),
        upstream = %profile.upstream_base_url,
        "resolved environment profile"
    );

    let db: Option<Arc<dyn DatabaseProbe>> = match &profile.database_url {
        Some(url) => {
            let pool = establish_connection(url).await?;
            Some(Arc::new(PgProbe { pool }))
        }
        None => {
            warn!("no database configured; readiness will report database=skipped");
            None
        }
    };

    let state = AppState::new(profile.clone(), db);

    let coordinator = Arc::new(ShutdownCoordinator::new(
        state.hub.clone(),
        profile.shutdown_grace,
    ));
    coordinator.install_signal_handler();
    shutdown::install_panic_hook(coordinator.clone());

    let _heartbeat = realtime::spawn_heartbeat(state.hub.clone(), profile.heartbeat_interval);

    let app = routes::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], profile.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "gateway listening");

    let shutdown_signal = {
        let coordinator = coordinator.clone();
        async move { coordinator.wait().await }
    };
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("server error")?;

    info!("listener closed, exiting");
    Ok(())
}

/// Connects the readiness pool and verifies it with one lightweight query.
async fn establish_connection(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("failed to verify database connection")?;

    info!("database connection verified");
    Ok(pool)
}
