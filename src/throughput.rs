//! Byte throughput tracking for bulk adds
//!
//! Fed from the bulk add progress callback, which may run on any thread, so
//! counters are atomics. Rates are bytes per second.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct ThroughputTracker {
    start: Instant,
    processed: AtomicU64,
    /// Peak rate, stored as `f64::to_bits`
    peak_rate: AtomicU64,
}

/// Final figures for one tracked transfer
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct ThroughputSummary {
    pub processed_bytes: u64,
    pub elapsed_secs: f64,
    pub average_rate: f64,
    pub peak_rate: f64,
}

impl Default for ThroughputTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputTracker {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(start: Instant) -> Self {
        Self {
            start,
            processed: AtomicU64::new(0),
            peak_rate: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Record `bytes` more bytes and return the cumulative rate so far
    pub fn record(&self, bytes: u64) -> f64 {
        self.record_at(bytes, Instant::now())
    }

    fn record_at(&self, bytes: u64, now: Instant) -> f64 {
        let processed = self.processed.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let rate = rate(processed, now.saturating_duration_since(self.start));
        let _ = self
            .peak_rate
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                (rate > f64::from_bits(bits)).then_some(rate.to_bits())
            });
        rate
    }

    pub fn processed_bytes(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn peak_rate(&self) -> f64 {
        f64::from_bits(self.peak_rate.load(Ordering::Relaxed))
    }

    /// Average over `elapsed`; the caller decides where the transfer ended
    pub fn summary(&self, elapsed: Duration) -> ThroughputSummary {
        let processed_bytes = self.processed_bytes();
        ThroughputSummary {
            processed_bytes,
            elapsed_secs: elapsed.as_secs_f64(),
            average_rate: rate(processed_bytes, elapsed),
            peak_rate: self.peak_rate(),
        }
    }
}

fn rate(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / secs
    } else {
        0.0
    }
}
