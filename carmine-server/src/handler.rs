//! # Connection Handler
//!
//! Drives one client connection: read bytes, drain complete frames from
//! the parser, execute each against the server, and write the reply
//! back in order. The loop is strictly sequential per connection, so
//! replies always match request order; different connections run in
//! their own tasks.

use std::sync::Arc;
use std::time::Instant;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::debug;

use carmine_common::{CommandError, Reply};

use crate::connection::Connection;
use crate::protocol::{RespError, RespParser};
use crate::server::Server;

/// Handles a single TCP client connection until EOF, a protocol error,
/// a write failure, or shutdown.
pub async fn handle_connection(
    stream: TcpStream,
    server: Arc<Server>,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    server.metrics().connection_opened();
    let result = drive(stream, &server, shutdown).await;
    server.metrics().connection_closed();
    result
}

async fn drive(
    mut stream: TcpStream,
    server: &Server,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let mut buffer = BytesMut::with_capacity(8 * 1024);
    let mut parser = RespParser::new();
    let mut conn = Connection::new();

    loop {
        let bytes = tokio::select! {
            read = stream.read_buf(&mut buffer) => read?,
            _ = shutdown.changed() => {
                debug!("connection closing for shutdown");
                return Ok(());
            }
        };
        if bytes == 0 {
            return Ok(());
        }

        loop {
            match parser.parse(&mut buffer) {
                Ok(Some(args)) => {
                    // An empty multibulk frame carries no command.
                    if args.is_empty() {
                        continue;
                    }
                    let started = Instant::now();
                    let reply = server.exec(&mut conn, &args);
                    if matches!(reply, Reply::Error(_)) {
                        server.metrics().record_error();
                    }
                    server.metrics().record_command(started.elapsed());
                    stream.write_all(&reply.to_bytes()).await?;
                }
                Ok(None) => break,
                Err(RespError::Protocol(message)) => {
                    // Report best-effort, then drop the connection; the
                    // stream position is no longer trustworthy.
                    let reply = Reply::Error(CommandError::Protocol(message));
                    let _ = stream.write_all(&reply.to_bytes()).await;
                    return Ok(());
                }
            }
        }
    }
}
