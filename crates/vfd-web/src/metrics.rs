//! Prometheus metrics for the Drive Control Core (§7a).
//!
//! Scoped down from the scan-cycle metrics this stack's dashboards
//! traditionally expose: there's no cycle-time histogram here because
//! there's no fixed-period scan loop to time, just the Poller's coarser
//! cadence and the command outcomes the adapter itself observes.

use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::IntoResponse;
use prometheus::{GaugeVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::state::AppState;

/// Registered Prometheus collectors plus the registry they're gathered
/// from at render time.
pub struct GatewayMetrics {
    registry: Registry,
    poll_cycles_total: IntCounter,
    poll_failures_total: IntCounter,
    bus_busy_total: IntCounter,
    commands_total: IntCounterVec,
    poll_fail_count: GaugeVec,
}

impl GatewayMetrics {
    /// Build and register every collector.
    #[must_use]
    pub fn new() -> Self {
        let registry = Registry::new();

        let poll_cycles_total =
            IntCounter::new("vfd_poll_cycles_total", "Total Poller loop iterations")
                .expect("metric creation should succeed");
        let poll_failures_total = IntCounter::new(
            "vfd_poll_failures_total",
            "Total per-drive poll failures across all drives",
        )
        .expect("metric creation should succeed");
        let bus_busy_total = IntCounter::new(
            "vfd_bus_busy_total",
            "Total requests rejected with BusBusy",
        )
        .expect("metric creation should succeed");
        let commands_total = IntCounterVec::new(
            Opts::new("vfd_commands_total", "Total commands issued, by outcome"),
            &["outcome"],
        )
        .expect("metric creation should succeed");
        let poll_fail_count = GaugeVec::new(
            Opts::new("vfd_drive_poll_fail_count", "Current consecutive poll failure count"),
            &["drive_id"],
        )
        .expect("metric creation should succeed");

        registry.register(Box::new(poll_cycles_total.clone())).expect("registration should succeed");
        registry.register(Box::new(poll_failures_total.clone())).expect("registration should succeed");
        registry.register(Box::new(bus_busy_total.clone())).expect("registration should succeed");
        registry.register(Box::new(commands_total.clone())).expect("registration should succeed");
        registry.register(Box::new(poll_fail_count.clone())).expect("registration should succeed");

        Self {
            registry,
            poll_cycles_total,
            poll_failures_total,
            bus_busy_total,
            commands_total,
            poll_fail_count,
        }
    }

    /// Record a command outcome (`"ok"`, `"error"`) as observed at the HTTP
    /// boundary.
    pub fn record_command(&self, outcome: &str) {
        self.commands_total.with_label_values(&[outcome]).inc();
    }

    /// Record a `BusBusy` rejection.
    pub fn record_bus_busy(&self) {
        self.bus_busy_total.inc();
    }

    /// Pull the Poller's own counters and every drive's current fail count
    /// from the core, refreshing the gauges just before rendering.
    fn refresh_from_core(&self, core: &vfd_core::DriveControlCore) {
        let poller_metrics = core.poller_metrics();
        let cycles_delta = poller_metrics
            .cycles_total()
            .saturating_sub(self.poll_cycles_total.get());
        if cycles_delta > 0 {
            self.poll_cycles_total.inc_by(cycles_delta);
        }
        let failures_delta = poller_metrics
            .poll_failures_total()
            .saturating_sub(self.poll_failures_total.get());
        if failures_delta > 0 {
            self.poll_failures_total.inc_by(failures_delta);
        }

        for summary in core.registry().summaries() {
            self.poll_fail_count
                .with_label_values(&[&summary.id])
                .set(f64::from(summary.poll_fail_count));
        }
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, core: &vfd_core::DriveControlCore) -> Result<String, prometheus::Error> {
        self.refresh_from_core(core);
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder.encode_to_string(&metric_families)
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// `GET /metrics`.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.render(&state.core) {
        Ok(output) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to render metrics: {e}"),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_metrics_render_known_names() {
        let metrics = GatewayMetrics::new();
        let core = vfd_core::DriveControlCore::new(
            vec![],
            Box::new(|| Err(vfd_common::error::TransportError::PortClosed)),
        );
        let output = metrics.render(&core).expect("should render");
        assert!(output.contains("vfd_poll_cycles_total"));
        assert!(output.contains("vfd_commands_total"));
    }

    #[test]
    fn record_command_increments_by_outcome() {
        let metrics = GatewayMetrics::new();
        metrics.record_command("ok");
        metrics.record_command("ok");
        metrics.record_command("error");
        assert_eq!(metrics.commands_total.with_label_values(&["ok"]).get(), 2);
        assert_eq!(metrics.commands_total.with_label_values(&["error"]).get(), 1);
    }
}
