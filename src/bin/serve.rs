//! HTTP server for /api/metrics, /api/health, /api/status
//!
//! Run with: cargo run --bin serve
//!
//! Binds BIND_ADDR (default 0.0.0.0:3000). RPC override, exclusions and
//! Cache-Control come from the environment.

use color_eyre::eyre::{Result, WrapErr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use dex_metrics::api::{router, AppState, SERVICE_NAME};
use dex_metrics::logging::{init_tracing, SERVER_DIRECTIVES};
use dex_metrics::{MetricsAggregator, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing(SERVER_DIRECTIVES)?;

    let settings = Settings::from_env()?;
    settings.validate()?;
    settings.log_summary();

    let aggregator = Arc::new(MetricsAggregator::from_settings(&settings)?);
    let app = router(AppState::new(aggregator, &settings)?);

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind {}", settings.bind_addr))?;
    info!("{} listening on {}", SERVICE_NAME, listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C received, shutting down");
}
