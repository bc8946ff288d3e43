//! In-memory histogram of per-group analysis time (aggregate + search + select).

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
    pub max_us: Option<u64>,
}

/// Orchestrator progress callback records, API reads. Microseconds.
pub struct SearchLatency {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl SearchLatency {
    /// Tracks 1us to 1h, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 3_600_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let us = elapsed.as_micros().clamp(1, 3_600_000_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn reset(&self) {
        if let Ok(mut h) = self.inner.lock() {
            h.reset();
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let empty = LatencySnapshot {
            samples: 0,
            p50_us: None,
            p95_us: None,
            p99_us: None,
            max_us: None,
        };
        let Ok(h) = self.inner.lock() else {
            return empty;
        };
        if h.len() == 0 {
            return empty;
        }
        LatencySnapshot {
            samples: h.len(),
            p50_us: Some(h.value_at_quantile(0.5)),
            p95_us: Some(h.value_at_quantile(0.95)),
            p99_us: Some(h.value_at_quantile(0.99)),
            max_us: Some(h.max()),
        }
    }
}

impl Default for SearchLatency {
    fn default() -> Self {
        Self::new()
    }
}
