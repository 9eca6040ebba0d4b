//! # Connection Pool
//!
//! Bounded pool of reusable TCP connections for the blocking client.
//! Idle connections queue behind a mutex; the total count is an atomic
//! so acquisition only locks while moving a connection in or out.
//! Connections that saw an IO or protocol error are discarded instead
//! of returned.

use std::collections::VecDeque;
use std::io::{BufReader, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::{ClientConfig, ClientError, ClientResult};
use crate::resp::{encode_command, read_response, RespValue};

struct Inner {
    config: ClientConfig,
    idle: Mutex<VecDeque<PooledStream>>,
    total: AtomicUsize,
}

/// Shared pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<Inner>,
}

impl ConnectionPool {
    pub fn new(config: ClientConfig) -> Self {
        ConnectionPool {
            inner: Arc::new(Inner {
                idle: Mutex::new(VecDeque::with_capacity(config.max_idle)),
                total: AtomicUsize::new(0),
                config,
            }),
        }
    }

    /// Takes an idle connection or dials a new one, up to the total cap.
    pub fn acquire(&self) -> ClientResult<PoolGuard> {
        let idle = {
            let mut queue = self.inner.idle.lock().expect("pool mutex poisoned");
            queue.pop_front()
        };
        if let Some(stream) = idle {
            return Ok(PoolGuard::new(Arc::clone(&self.inner), stream));
        }

        if !self.try_reserve() {
            return Err(ClientError::PoolExhausted);
        }
        match PooledStream::connect(&self.inner.config) {
            Ok(stream) => Ok(PoolGuard::new(Arc::clone(&self.inner), stream)),
            Err(err) => {
                self.inner.total.fetch_sub(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    fn try_reserve(&self) -> bool {
        let mut seen = self.inner.total.load(Ordering::Relaxed);
        loop {
            if seen >= self.inner.config.max_total {
                return false;
            }
            match self.inner.total.compare_exchange(
                seen,
                seen + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => seen = actual,
            }
        }
    }
}

/// RAII guard; returns a healthy connection to the idle queue on drop.
pub struct PoolGuard {
    pool: Arc<Inner>,
    stream: Option<PooledStream>,
    healthy: bool,
}

impl PoolGuard {
    fn new(pool: Arc<Inner>, stream: PooledStream) -> Self {
        PoolGuard {
            pool,
            stream: Some(stream),
            healthy: true,
        }
    }

    /// Sends one command and reads its reply.
    pub fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        let stream = self.stream.as_mut().expect("guard holds a stream");
        let result = stream.exec(args);
        if result.is_err() {
            // Do not reuse a stream whose framing state is unknown.
            self.healthy = false;
        }
        result
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => return,
        };

        if self.healthy {
            let mut queue = self.pool.idle.lock().expect("pool mutex poisoned");
            if queue.len() < self.pool.config.max_idle {
                queue.push_back(stream);
                return;
            }
        }
        self.pool.total.fetch_sub(1, Ordering::Relaxed);
    }
}

/// One TCP connection with its reusable encode/decode buffers.
struct PooledStream {
    reader: BufReader<TcpStream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl PooledStream {
    fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let addr = resolve(&config.addr)?;
        let stream = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        // Small request/reply pairs; waiting on Nagle only adds latency.
        stream.set_nodelay(true)?;

        Ok(PooledStream {
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        })
    }

    fn exec(&mut self, args: &[&[u8]]) -> ClientResult<RespValue> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_response(&mut self.reader, &mut self.line_buf)
    }
}

fn resolve(addr: &str) -> ClientResult<SocketAddr> {
    addr.to_socket_addrs()
        .map_err(|_| ClientError::InvalidAddress)?
        .next()
        .ok_or(ClientError::InvalidAddress)
}
