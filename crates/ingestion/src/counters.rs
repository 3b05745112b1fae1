//! Capture timer counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one simulated capture unit, shared with the CLI summary.
#[derive(Debug, Default)]
pub struct CaptureMetrics {
    /// Edges delivered to the engine
    pub edges_delivered: AtomicU64,

    /// Edges outside the armed window or of the wrong polarity
    pub edges_ignored: AtomicU64,

    /// Window timeouts delivered to the engine
    pub timeouts: AtomicU64,
}

impl CaptureMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_delivered(&self) {
        self.edges_delivered.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("capture_edges_delivered_total").increment(1);
    }

    pub fn record_ignored(&self) {
        self.edges_ignored.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("capture_edges_ignored_total").increment(1);
    }

    pub fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("capture_timeouts_total").increment(1);
    }

    pub fn snapshot(&self) -> CaptureSnapshot {
        CaptureSnapshot {
            edges_delivered: self.edges_delivered.load(Ordering::Relaxed),
            edges_ignored: self.edges_ignored.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CaptureMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSnapshot {
    pub edges_delivered: u64,
    pub edges_ignored: u64,
    pub timeouts: u64,
}
