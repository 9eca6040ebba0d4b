//! # Blocking Client Facade
//!
//! `Client` hides the pool and the protocol behind a byte-slice API.
//! Each call acquires a pooled connection, runs one command, and
//! returns the connection on drop.

use std::fmt;
use std::time::Duration;

use crate::pool::ConnectionPool;
use crate::resp::RespValue;

/// Result type for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug)]
pub enum ClientError {
    /// Network failure while reading or writing.
    Io(std::io::Error),
    /// RESP framing violation in a server response.
    Protocol,
    /// The server answered with an error reply.
    Server { message: Vec<u8> },
    /// The reply type did not match the command.
    UnexpectedResponse,
    /// No idle connection and the pool is at its total cap.
    PoolExhausted,
    /// The configured address did not resolve.
    InvalidAddress,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(err) => write!(f, "io error: {}", err),
            ClientError::Protocol => write!(f, "protocol error"),
            ClientError::Server { message } => {
                write!(f, "server error: {}", String::from_utf8_lossy(message))
            }
            ClientError::UnexpectedResponse => write!(f, "unexpected response"),
            ClientError::PoolExhausted => write!(f, "connection pool exhausted"),
            ClientError::InvalidAddress => write!(f, "invalid address"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err)
    }
}

/// TTL state reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientTtl {
    /// Key missing or already expired.
    Missing,
    /// Key present with no deadline.
    NoExpiry,
    /// Key expires after this long.
    ExpiresIn(Duration),
}

/// Client and pool configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address, e.g. "127.0.0.1:3301".
    pub addr: String,
    /// Idle connections kept for reuse.
    pub max_idle: usize,
    /// Total connections, idle plus in-use.
    pub max_total: usize,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            addr: "127.0.0.1:3301".to_string(),
            max_idle: 8,
            max_total: 16,
            read_timeout: None,
            write_timeout: None,
            connect_timeout: None,
        }
    }
}

/// Pooled blocking client.
pub struct Client {
    pool: ConnectionPool,
}

impl Client {
    /// Connects with default settings to the given address.
    pub fn connect(addr: impl Into<String>) -> Client {
        let config = ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        };
        Client::with_config(config)
    }

    /// Builds a client over a custom configuration.
    pub fn with_config(config: ClientConfig) -> Client {
        Client {
            pool: ConnectionPool::new(config),
        }
    }

    /// Runs a raw command and returns the parsed reply.
    ///
    /// Error replies surface as values here, not `Err`; typed helpers
    /// below translate them.
    pub fn exec(&self, args: &[&[u8]]) -> ClientResult<RespValue> {
        let mut conn = self.pool.acquire()?;
        conn.exec(args)
    }

    /// Fetches a value; `Ok(None)` when the key is missing.
    pub fn get(&self, key: &[u8]) -> ClientResult<Option<Vec<u8>>> {
        match self.exec(&[b"GET", key])? {
            RespValue::Bulk(data) => Ok(data),
            other => Err(unexpected(other)),
        }
    }

    /// Stores a value without expiry.
    pub fn set(&self, key: &[u8], value: &[u8]) -> ClientResult<()> {
        match self.exec(&[b"SET", key, value])? {
            RespValue::Simple(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Stores a value that expires after `ttl` (millisecond precision).
    pub fn set_with_expiry(&self, key: &[u8], value: &[u8], ttl: Duration) -> ClientResult<()> {
        let millis = ttl.as_millis().max(1).to_string();
        match self.exec(&[b"SET", key, value, b"PX", millis.as_bytes()])? {
            RespValue::Simple(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Deletes a key. Returns whether anything was removed.
    pub fn delete(&self, key: &[u8]) -> ClientResult<bool> {
        match self.exec(&[b"DEL", key])? {
            RespValue::Integer(count) => Ok(count > 0),
            other => Err(unexpected(other)),
        }
    }

    /// Adds `delta` to an integer key and returns the new value.
    pub fn incr_by(&self, key: &[u8], delta: i64) -> ClientResult<i64> {
        let delta = delta.to_string();
        match self.exec(&[b"INCRBY", key, delta.as_bytes()])? {
            RespValue::Integer(value) => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    /// Sets a key's TTL in whole seconds. Returns whether it applied.
    pub fn expire(&self, key: &[u8], ttl: Duration) -> ClientResult<bool> {
        let seconds = ttl.as_secs().to_string();
        match self.exec(&[b"EXPIRE", key, seconds.as_bytes()])? {
            RespValue::Integer(applied) => Ok(applied == 1),
            other => Err(unexpected(other)),
        }
    }

    /// Reports a key's TTL state.
    pub fn ttl(&self, key: &[u8]) -> ClientResult<ClientTtl> {
        match self.exec(&[b"TTL", key])? {
            RespValue::Integer(-2) => Ok(ClientTtl::Missing),
            RespValue::Integer(-1) => Ok(ClientTtl::NoExpiry),
            RespValue::Integer(seconds) if seconds >= 0 => {
                Ok(ClientTtl::ExpiresIn(Duration::from_secs(seconds as u64)))
            }
            other => Err(unexpected(other)),
        }
    }

    /// Pings the server, optionally with a payload to echo.
    pub fn ping(&self, payload: Option<&[u8]>) -> ClientResult<Vec<u8>> {
        let reply = match payload {
            Some(data) => self.exec(&[b"PING", data])?,
            None => self.exec(&[b"PING"])?,
        };
        match reply {
            RespValue::Simple(text) => Ok(text),
            RespValue::Bulk(Some(data)) => Ok(data),
            other => Err(unexpected(other)),
        }
    }

    /// Switches the pooled connection's database.
    ///
    /// Note that the selection sticks to whichever pooled connection
    /// served this call; mixed-database workloads should dedicate a
    /// client (`max_total = 1`) per database.
    pub fn select(&self, index: u32) -> ClientResult<()> {
        let index = index.to_string();
        match self.exec(&[b"SELECT", index.as_bytes()])? {
            RespValue::Simple(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Adds one scored member. Returns the number of new members.
    pub fn zadd(&self, key: &[u8], score: f64, member: &[u8]) -> ClientResult<i64> {
        let score = score.to_string();
        match self.exec(&[b"ZADD", key, score.as_bytes(), member])? {
            RespValue::Integer(added) => Ok(added),
            other => Err(unexpected(other)),
        }
    }

    /// Fetches a member's score, if the member exists.
    pub fn zscore(&self, key: &[u8], member: &[u8]) -> ClientResult<Option<f64>> {
        match self.exec(&[b"ZSCORE", key, member])? {
            RespValue::Bulk(None) => Ok(None),
            RespValue::Bulk(Some(data)) => std::str::from_utf8(&data)
                .ok()
                .and_then(|text| text.parse::<f64>().ok())
                .map(Some)
                .ok_or(ClientError::Protocol),
            other => Err(unexpected(other)),
        }
    }

    /// Cardinality of a sorted set.
    pub fn zcard(&self, key: &[u8]) -> ClientResult<i64> {
        match self.exec(&[b"ZCARD", key])? {
            RespValue::Integer(count) => Ok(count),
            other => Err(unexpected(other)),
        }
    }
}

/// Maps a mismatched reply to an error, unwrapping server errors first.
fn unexpected(reply: RespValue) -> ClientError {
    match reply {
        RespValue::Error(message) => ClientError::Server { message },
        _ => ClientError::UnexpectedResponse,
    }
}
