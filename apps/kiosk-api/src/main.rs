//! # Kiosk POS API Server
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AppConfig::load()           env + defaults, validated once             │
//! │  Database::new()             pool + migrations                          │
//! │  bootstrap_admin()           only when the user table is empty          │
//! │  NotificationWorker::run     ──► tokio::spawn                           │
//! │  ReportScheduler::run        ──► tokio::spawn                           │
//! │  axum::serve                 until Ctrl+C / SIGTERM                     │
//! │  shutdown: workers, then pool                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use anyhow::Context;
use kiosk_api::auth::bootstrap_admin;
use kiosk_api::config::AppConfig;
use kiosk_api::notifier::{notifier_from_config, NotificationWorker};
use kiosk_api::scheduler::ReportScheduler;
use kiosk_api::{build_router, AppState};
use kiosk_db::{Database, DbConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kiosk_api=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Kiosk POS API server...");

    let config = AppConfig::load().context("Invalid configuration")?;
    info!(
        port = config.http_port,
        database = %config.database_path.display(),
        "Configuration loaded"
    );

    if let Some(dir) = config.database_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create data directory {}", dir.display()))?;
    }

    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.db_max_connections),
    )
    .await
    .context("Failed to open database")?;
    info!("Database ready");

    if bootstrap_admin(&db, &config)
        .await
        .context("Failed to create bootstrap admin")?
    {
        info!(username = %config.admin_username, "Created bootstrap admin account");
    }

    let notifier = notifier_from_config(&config).context("Failed to set up notifier")?;
    let (worker, worker_handle) = NotificationWorker::new(&db, notifier, config.notify_poll);
    tokio::spawn(worker.run());

    let (scheduler, scheduler_handle) =
        ReportScheduler::new(&db, config.report_hour_utc, config.scheduler_tick);
    tokio::spawn(scheduler.run());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let state = AppState::new(db.clone(), config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    worker_handle.shutdown().await;
    scheduler_handle.shutdown().await;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
