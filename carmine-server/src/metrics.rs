//! # Server Metrics
//!
//! Lightweight counters and a fixed-bucket latency histogram for the
//! request path. Recording is a handful of relaxed atomic operations;
//! cross-field consistency is not needed, only eventual totals. INFO
//! renders a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Latency bucket boundaries in microseconds; the last bucket catches
/// everything slower.
pub const LATENCY_BUCKETS_US: [u64; 12] =
    [1, 2, 5, 10, 20, 50, 100, 200, 500, 1_000, 2_000, 5_000];

/// Point-in-time view of all counters.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Commands executed since startup.
    pub commands_total: u64,
    /// Error replies produced since startup.
    pub errors_total: u64,
    /// Currently open client connections.
    pub connections_open: u64,
    /// Latency bucket counts; one more entry than `LATENCY_BUCKETS_US`.
    pub latency_buckets: Vec<u64>,
    /// Total latency samples.
    pub latency_samples: u64,
    /// Sum of sampled latencies in microseconds.
    pub latency_sum_us: u64,
}

/// Thread-safe metrics accumulator shared by all connection tasks.
pub struct Metrics {
    commands_total: AtomicU64,
    errors_total: AtomicU64,
    connections_open: AtomicU64,
    latency_buckets: Vec<AtomicU64>,
    latency_samples: AtomicU64,
    latency_sum_us: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        let mut buckets = Vec::with_capacity(LATENCY_BUCKETS_US.len() + 1);
        for _ in 0..LATENCY_BUCKETS_US.len() + 1 {
            buckets.push(AtomicU64::new(0));
        }
        Metrics {
            commands_total: AtomicU64::new(0),
            errors_total: AtomicU64::new(0),
            connections_open: AtomicU64::new(0),
            latency_buckets: buckets,
            latency_samples: AtomicU64::new(0),
            latency_sum_us: AtomicU64::new(0),
        }
    }

    /// Records an accepted connection.
    pub fn connection_opened(&self) {
        self.connections_open.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a closed connection.
    pub fn connection_closed(&self) {
        self.connections_open.fetch_sub(1, Ordering::Relaxed);
    }

    /// Records one executed command and its latency.
    pub fn record_command(&self, latency: Duration) {
        self.commands_total.fetch_add(1, Ordering::Relaxed);

        let micros = latency.as_micros().min(u64::MAX as u128) as u64;
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(micros, Ordering::Relaxed);

        // Linear scan; the bucket list is short and stays hot in cache.
        let slot = LATENCY_BUCKETS_US
            .iter()
            .position(|&bound| micros <= bound)
            .unwrap_or(LATENCY_BUCKETS_US.len());
        self.latency_buckets[slot].fetch_add(1, Ordering::Relaxed);
    }

    /// Records an error reply.
    pub fn record_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_total: self.commands_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            connections_open: self.connections_open.load(Ordering::Relaxed),
            latency_buckets: self
                .latency_buckets
                .iter()
                .map(|bucket| bucket.load(Ordering::Relaxed))
                .collect(),
            latency_samples: self.latency_samples.load(Ordering::Relaxed),
            latency_sum_us: self.latency_sum_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
