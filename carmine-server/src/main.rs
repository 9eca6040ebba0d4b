//! Process entry point: logging, the listener, and signal-driven
//! graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use carmine_server::{serve, Server, DB_COUNT, DEFAULT_PORT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let server = Arc::new(Server::new());
    let listener = TcpListener::bind(("0.0.0.0", DEFAULT_PORT))
        .await
        .with_context(|| format!("bind port {}", DEFAULT_PORT))?;
    info!(port = DEFAULT_PORT, databases = DB_COUNT, "carmine starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sigint = signal(SignalKind::interrupt()).context("install SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let mut sigquit = signal(SignalKind::quit()).context("install SIGQUIT handler")?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
            _ = sigquit.recv() => {}
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    serve(listener, server, shutdown_rx).await?;
    info!("carmine stopped");
    Ok(())
}
