//! Book fair reservation server.

use anyhow::Context;
use bookfair_reservations::{
    config::Config,
    events::{EventSink, InMemoryEventLog},
    server::{AppState, build_router},
    Engine,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookfair_reservations=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting book fair reservation server");
    bookfair_runtime::metrics::describe_metrics();

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        address = %config.bind_address(),
        vendor_quota = config.booking.vendor_quota,
        halls = config.inventory.halls.len(),
        stalls_per_hall = config.inventory.stalls_per_hall,
        "Configuration loaded"
    );

    let audit = Arc::new(InMemoryEventLog::new());
    let engine = Arc::new(Engine::from_config(
        &config,
        Arc::clone(&audit) as Arc<dyn EventSink>,
    ));
    engine
        .seed(&config.inventory)
        .await
        .context("failed to seed stall inventory")?;

    let app = build_router(AppState::new(Arc::clone(&engine), audit));

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(address = %config.bind_address(), "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped, draining in-flight effects");
    match engine
        .shutdown(Duration::from_secs(config.server.shutdown_timeout))
        .await
    {
        Ok(()) => info!("Shutdown complete"),
        Err(e) => warn!(error = %e, "Effects still running at shutdown timeout"),
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
