use anyhow::{Context, Result};
use clap::Parser;
use signal_relay_server::{ServerConfig, SignalingServer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    let server = SignalingServer::bind(&config)
        .await
        .with_context(|| format!("failed to start server on {}", config.bind))?;

    info!("WebRTC signaling relay listening on {}", server.local_addr()?);

    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
