//! Poll counters the external adapter's `/metrics` endpoint reads (§7a).
//!
//! This is not a Prometheus registry itself — vfd-web owns that — just the
//! raw process-lifetime counts the Poller accumulates as it runs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime poll counters.
#[derive(Debug, Default)]
pub struct PollerMetrics {
    cycles_total: AtomicU64,
    poll_failures_total: AtomicU64,
    reinitializations_total: AtomicU64,
}

impl PollerMetrics {
    /// A fresh all-zero counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll_failure(&self) {
        self.poll_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reinitialization(&self) {
        self.reinitializations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Total poller loop iterations since process start.
    #[must_use]
    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    /// Total per-drive poll failures (any non-port-closed error) since start.
    #[must_use]
    pub fn poll_failures_total(&self) -> u64 {
        self.poll_failures_total.load(Ordering::Relaxed)
    }

    /// Total bus recovery (`initialize`) attempts triggered by the `>5`
    /// threshold since start.
    #[must_use]
    pub fn reinitializations_total(&self) -> u64 {
        self.reinitializations_total.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metrics_are_zero() {
        let m = PollerMetrics::new();
        assert_eq!(m.cycles_total(), 0);
        assert_eq!(m.poll_failures_total(), 0);
        assert_eq!(m.reinitializations_total(), 0);
    }

    #[test]
    fn counters_increment_independently() {
        let m = PollerMetrics::new();
        m.record_cycle();
        m.record_cycle();
        m.record_poll_failure();
        m.record_reinitialization();
        assert_eq!(m.cycles_total(), 2);
        assert_eq!(m.poll_failures_total(), 1);
        assert_eq!(m.reinitializations_total(), 1);
    }
}
