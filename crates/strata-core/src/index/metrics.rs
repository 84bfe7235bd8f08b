//! Search instrumentation counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative search counters for one index.
///
/// Incremented only when the search path is monomorphized with metrics
/// collection enabled, so the counters cost nothing otherwise.
#[derive(Debug, Default)]
pub struct SearchMetrics {
    hops: AtomicU64,
    distance_computations: AtomicU64,
}

/// Point-in-time copy of [`SearchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Nodes expanded across all searches.
    pub hops: u64,
    /// Pairwise distances evaluated across all searches.
    pub distance_computations: u64,
}

impl SearchMetrics {
    #[inline]
    pub(crate) fn record(&self, hops: u64, distances: u64) {
        self.hops.fetch_add(hops, Ordering::Relaxed);
        self.distance_computations
            .fetch_add(distances, Ordering::Relaxed);
    }

    /// Reads the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hops: self.hops.load(Ordering::Relaxed),
            distance_computations: self.distance_computations.load(Ordering::Relaxed),
        }
    }

    /// Resets both counters to zero.
    pub fn reset(&self) {
        self.hops.store(0, Ordering::Relaxed);
        self.distance_computations.store(0, Ordering::Relaxed);
    }
}
