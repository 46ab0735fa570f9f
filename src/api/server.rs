//! Server lifecycle: bind → spawn background task → return handle with
//! shutdown channel.
//!
//! When a retention window is configured, the shutdown-signal future also
//! runs a periodic sweep that purges old uploads/results and evicts
//! expired CAPTCHA challenges. The sweep stops with the server.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::api::router::build_router;
use crate::api::types::AppContext;

/// Upper bound on the time between two retention sweeps.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(300);
/// Lower bound, so a tiny retention window cannot spin the loop.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to get server address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

// ═══════════════════════════════════════════════════════════
// Public types
// ═══════════════════════════════════════════════════════════

/// Metadata for a running server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub addr: SocketAddr,
    pub started_at: String,
    pub retention_secs: Option<u64>,
}

/// Handle to a running server.
pub struct AppServer {
    pub info: ServerInfo,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AppServer {
    pub fn addr(&self) -> SocketAddr {
        self.info.addr
    }

    /// Signal graceful shutdown. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("Server shutdown signal sent");
        }
    }

    /// Signal shutdown and wait for in-flight requests to drain.
    pub async fn shutdown_and_wait(mut self) {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("Server task ended abnormally: {e}");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Server lifecycle
// ═══════════════════════════════════════════════════════════

/// Bind `addr` (port 0 picks an ephemeral port), build the router and
/// spawn `axum::serve` in a background task.
pub async fn start_server_on(ctx: AppContext, addr: SocketAddr) -> Result<AppServer, ServerError> {
    // 1. Bind
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let addr = listener.local_addr().map_err(ServerError::LocalAddr)?;

    // 2. Router
    let retention = ctx.config.retention_secs.map(Duration::from_secs);
    let app = build_router(ctx.clone());

    let info = ServerInfo {
        addr,
        started_at: chrono::Utc::now().to_rfc3339(),
        retention_secs: ctx.config.retention_secs,
    };

    // 3. Shutdown signal
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    // 4. Spawn
    let task = tokio::spawn(async move {
        let shutdown_signal = async move {
            let manual = async {
                let _ = shutdown_rx.await;
            };
            let sweeper = async {
                match retention {
                    Some(retention) => sweep_loop(ctx, retention).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::select! {
                () = manual => { tracing::info!("Server received shutdown signal"); }
                () = sweeper => {}
            }
        };

        tracing::info!(%addr, "Server started");

        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
        {
            tracing::error!("Server error: {e}");
        }

        tracing::info!("Server stopped");
    });

    Ok(AppServer {
        info,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    })
}

// ---------------------------------------------------------------------------
// Retention sweep
// ---------------------------------------------------------------------------

fn sweep_interval(retention: Duration) -> Duration {
    retention.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

async fn sweep_loop(ctx: AppContext, retention: Duration) {
    let interval = sweep_interval(retention);
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Retention sweep enabled"
    );
    loop {
        tokio::time::sleep(interval).await;
        sweep_once(&ctx, retention).await;
    }
}

/// Purge stored files older than `retention` and evict expired
/// challenges. Returns the number of files removed.
pub async fn sweep_once(ctx: &AppContext, retention: Duration) -> usize {
    let store = ctx.pipeline.store().clone();
    let purged = match tokio::task::spawn_blocking(move || store.purge_older_than(retention)).await {
        Ok(Ok(count)) => count,
        Ok(Err(e)) => {
            tracing::warn!("Retention sweep failed: {e}");
            0
        }
        Err(e) => {
            tracing::warn!("Retention sweep task failed: {e}");
            0
        }
    };

    let evicted = match ctx.sessions.lock() {
        Ok(mut sessions) => sessions.evict_expired(),
        Err(_) => {
            tracing::warn!("Session store lock poisoned; skipping eviction");
            0
        }
    };

    if purged > 0 || evicted > 0 {
        tracing::info!(files = purged, challenges = evicted, "Retention sweep");
    }
    purged
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
