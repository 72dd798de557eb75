use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use vision_server::app::{self, AppState};
use vision_server::config::Config;
use vision_server::logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logger::init(&config)?;

    let state = Arc::new(AppState::new(config.service_mode));
    app::init_service(&state, &config).await?;

    let listener = TcpListener::bind(config.bind).await?;
    info!(addr = %config.bind, mode = %config.service_mode, "vision-server listening");

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("vision-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
