//! Arena API server entry point
//!
//! Bootstraps configuration from the environment, wires the engine stack,
//! and serves the Axum router until shutdown.

use arena_api::{build_state, create_api_router, ApiConfig};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ApiConfig::from_env()?;
    let state = build_state(&config);
    let scheduler = state.scheduler.clone();
    let app = create_api_router(state);

    tracing::info!(addr = %config.bind_addr, "Starting arena API server");
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    tokio::select! {
        result = server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            scheduler.shutdown();
        }
    }

    Ok(())
}
