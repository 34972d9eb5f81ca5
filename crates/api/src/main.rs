use std::sync::Arc;

use anyhow::Context;
use tripstay_infra::{EngineConfig, ExpirySweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tripstay_observability::init();

    let config = EngineConfig::from_env().context("invalid configuration")?;
    let services = Arc::new(
        tripstay_api::app::services::build_services(&config)
            .await
            .context("failed to build services")?,
    );

    let sweeper = ExpirySweeper::new(config.sweep_interval)
        .spawn("expiry-sweeper", Arc::clone(&services.allocation))
        .context("failed to start expiry sweeper")?;

    let app = tripstay_api::app::build_app(Arc::clone(&services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tokio::task::spawn_blocking(move || sweeper.shutdown()).await?;
    served.context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
