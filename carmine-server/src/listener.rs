//! # TCP Acceptor
//!
//! Accept loop with graceful shutdown: every accepted socket gets its
//! own handler task in a `JoinSet`; when the shutdown signal fires the
//! listener stops accepting, live handlers are told to wind down over
//! the shared watch channel, and the set is drained before returning.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::handler::handle_connection;
use crate::server::Server;

/// Serves connections on `listener` until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    server: Arc<Server>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let mut accept_shutdown = shutdown.clone();
    let mut handlers = JoinSet::new();
    info!(addr = %listener.local_addr()?, "accepting connections");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");
                        let server = Arc::clone(&server);
                        let shutdown = shutdown.clone();
                        handlers.spawn(async move {
                            if let Err(error) = handle_connection(stream, server, shutdown).await {
                                debug!(%peer, %error, "connection ended with error");
                            }
                        });
                    }
                    Err(error) => warn!(%error, "accept failed"),
                }
            }
            _ = accept_shutdown.changed() => break,
        }
    }

    // Stop accepting before waiting out the in-flight handlers.
    drop(listener);
    info!(open = handlers.len(), "draining connections");
    while handlers.join_next().await.is_some() {}
    info!("all connections closed");
    Ok(())
}
