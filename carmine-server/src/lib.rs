//! # Carmine Server
//!
//! Redis-compatible TCP front end over the Carmine storage engine:
//! a streaming RESP parser, a command table covering the string,
//! sorted-set, keyspace, and server families, sixteen selectable
//! logical databases, and an acceptor with graceful shutdown.

mod command;
mod connection;
mod handler;
mod listener;
mod metrics;
mod protocol;
mod server;

pub use connection::Connection;
pub use handler::handle_connection;
pub use listener::serve;
pub use metrics::{Metrics, MetricsSnapshot, LATENCY_BUCKETS_US};
pub use protocol::{RespError, RespParser};
pub use server::{Server, DB_COUNT, DEFAULT_PORT};
