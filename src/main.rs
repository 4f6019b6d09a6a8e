mod api;
mod config;
mod engine;
mod error;
mod geo;
mod models;
mod observability;
mod provision;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::provision::docker::DockerProvisioner;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let provisioner = Arc::new(DockerProvisioner::new(
        config.container_image.clone(),
        config.container_internal_port,
    ));

    let shared_state = Arc::new(state::AppState::new(&config, provisioner));
    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "dispatch server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    // Leave no ride containers behind on shutdown.
    let stopped = shared_state.orchestrator.cleanup_all().await;
    tracing::info!(stopped, "shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
