use serde::Serialize;
use std::sync::Arc;
/// Proxy counters and timing helpers
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Which listener a connection arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Tls,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Http => f.write_str("HTTP"),
            Protocol::Tls => f.write_str("TLS"),
        }
    }
}

/// Metrics collector for the proxy
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// Connections accepted on the HTTP listener
    pub http_connections: Arc<AtomicU64>,
    /// Connections accepted on the TLS listener
    pub tls_connections: Arc<AtomicU64>,
    /// Sessions that reached the bridging stage
    pub sessions_started: Arc<AtomicU64>,
    /// Sessions torn down
    pub sessions_completed: Arc<AtomicU64>,
    /// Bytes copied client -> backend, replayed prefix included
    pub bytes_upstream: Arc<AtomicU64>,
    /// Bytes copied backend -> client
    pub bytes_downstream: Arc<AtomicU64>,
    /// Connections dropped before dialing (bad input or unmapped host)
    pub routing_failures: Arc<AtomicU64>,
    /// Failed or timed out upstream dials
    pub upstream_errors: Arc<AtomicU64>,
    /// Admin flush commands served
    pub flushes: Arc<AtomicU64>,
    /// Total session lifetime in microseconds
    pub total_session_time_us: Arc<AtomicU64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_connection(&self, protocol: Protocol) {
        match protocol {
            Protocol::Http => self.http_connections.fetch_add(1, Ordering::Relaxed),
            Protocol::Tls => self.tls_connections.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn record_session_start(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_end(&self, bytes_upstream: u64, bytes_downstream: u64, duration: Duration) {
        self.sessions_completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_upstream
            .fetch_add(bytes_upstream, Ordering::Relaxed);
        self.bytes_downstream
            .fetch_add(bytes_downstream, Ordering::Relaxed);
        self.total_session_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_routing_failure(&self) {
        self.routing_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let started = self.sessions_started.load(Ordering::Relaxed);
        let completed = self.sessions_completed.load(Ordering::Relaxed);
        let total_time_us = self.total_session_time_us.load(Ordering::Relaxed);

        MetricsSnapshot {
            http_connections: self.http_connections.load(Ordering::Relaxed),
            tls_connections: self.tls_connections.load(Ordering::Relaxed),
            sessions_started: started,
            sessions_completed: completed,
            active_sessions: started.saturating_sub(completed),
            bytes_upstream: self.bytes_upstream.load(Ordering::Relaxed),
            bytes_downstream: self.bytes_downstream.load(Ordering::Relaxed),
            routing_failures: self.routing_failures.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            average_session_time_ms: if completed > 0 {
                (total_time_us as f64 / completed as f64) / 1000.0
            } else {
                0.0
            },
        }
    }
}

/// Point-in-time copy of the counters, served by the healthcheck endpoint
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub http_connections: u64,
    pub tls_connections: u64,
    pub sessions_started: u64,
    pub sessions_completed: u64,
    pub active_sessions: u64,
    pub bytes_upstream: u64,
    pub bytes_downstream: u64,
    pub routing_failures: u64,
    pub upstream_errors: u64,
    pub flushes: u64,
    pub average_session_time_ms: f64,
}

/// Helper for timing operations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
