use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::realtime::RealtimeHub;

/// Coordinates graceful termination: first trigger closes every realtime
/// client with a reason, releases the graceful-shutdown future handed to the
/// server, and arms a hard-exit timer so shutdown is bounded rather than
/// best-effort-forever. Subsequent triggers are logged and ignored.
pub struct ShutdownCoordinator {
    hub: Arc<RealtimeHub>,
    grace: Duration,
    started: AtomicBool,
    tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub fn new(hub: Arc<RealtimeHub>, grace: Duration) -> Self {
        let (tx, _rx) = watch::channel(false);
        ShutdownCoordinator {
            hub,
            grace,
            started: AtomicBool::new(false),
            tx,
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Idempotent. The hard-exit timer runs on a plain thread so it fires
    /// even if the async runtime is wedged.
    pub fn trigger(&self, origin: &str) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(origin, "shutdown already in progress, ignoring");
            return;
        }
        info!(origin, "shutting down");

        let notified = self.hub.close_all("server_shutting_down");
        info!(notified, "notified realtime clients of shutdown");

        let _ = self.tx.send(true);

        let grace = self.grace;
        std::thread::spawn(move || {
            std::thread::sleep(grace);
            error!(
                grace_secs = grace.as_secs(),
                "graceful shutdown exceeded grace period, forcing exit"
            );
            std::process::exit(1);
        });
    }

    /// Resolves once `trigger` has run. Handed to
    /// `axum::serve(..).with_graceful_shutdown(..)`.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Spawns the signal listener. The loop keeps running so a re-entrant
    /// signal is observed (and ignored) rather than killing the process
    /// mid-drain with default signal disposition.
    pub fn install_signal_handler(self: &Arc<Self>) {
        let coord = self.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut term =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("failed to install SIGTERM handler");
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => coord.trigger("SIGINT"),
                        _ = term.recv() => coord.trigger("SIGTERM"),
                    }
                }
            }
            #[cfg(not(unix))]
            {
                loop {
                    let _ = tokio::signal::ctrl_c().await;
                    coord.trigger("ctrl-c");
                }
            }
        });
    }
}

/// Routes process-level faults (panics anywhere in the process) into the
/// shutdown path: serving traffic after an uncaught panic risks inconsistent
/// in-memory state, the connection registry included.
pub fn install_panic_hook(coord: Arc<ShutdownCoordinator>) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_hook(info);
        error!("panic: {info}");
        coord.trigger("panic");
    }));
}
