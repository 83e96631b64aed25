/// Backoff used by the accept loops when `accept` keeps failing
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Exponential backoff delay for the given attempt number (0-indexed)
pub fn exponential_backoff(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let delay_ms = base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt.min(10))) // 2^attempt with cap at 2^10
        .min(max_delay_ms);
    Duration::from_millis(delay_ms)
}

/// Consecutive-failure counter for an accept loop.
///
/// Each failure grows the delay; a successful accept resets it.
#[derive(Debug)]
pub struct AcceptBackoff {
    failures: AtomicU32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl Default for AcceptBackoff {
    fn default() -> Self {
        Self::new(10, 1000)
    }
}

impl AcceptBackoff {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            failures: AtomicU32::new(0),
            base_delay_ms,
            max_delay_ms,
        }
    }

    pub fn next_delay(&self) -> Duration {
        let attempt = self.failures.fetch_add(1, Ordering::Relaxed);
        exponential_backoff(attempt, self.base_delay_ms, self.max_delay_ms)
    }

    pub fn reset(&self) {
        self.failures.store(0, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }
}
