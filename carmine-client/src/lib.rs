//! # Carmine Sync Client
//!
//! A compact, blocking Redis-compatible client with connection pooling,
//! used by tooling and the server's end-to-end tests.

mod client;
mod pool;
mod resp;

pub use client::{Client, ClientConfig, ClientError, ClientResult, ClientTtl};
pub use resp::RespValue;
