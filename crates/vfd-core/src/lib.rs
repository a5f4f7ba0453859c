//! The Drive Control Core: the function-code codec, the bus arbiter, the
//! VFD registry and state mirror, the poller, and the command surface.
//!
//! [`DriveControlCore`] is the single process-scoped value that ties these
//! together (§9 "Global mutable state" — a constructed value passed
//! explicitly to callers, not ambient statics).

pub mod arbiter;
pub mod codec;
pub mod command;
pub mod metrics;
pub mod poller;
pub mod registry;

pub use arbiter::{BusArbiter, TransportFactory};
pub use command::CommandSurface;
pub use metrics::PollerMetrics;
pub use registry::{DriveSummary, Registry};

use std::time::Duration;
use vfd_common::types::DriveDescriptor;

/// Default deadline a caller waits for exclusive bus access before observing
/// `BusBusy` (§4.3).
pub const DEFAULT_ACQUIRE_DEADLINE: Duration = Duration::from_millis(400);

/// The process-scoped Drive Control Core: the registry of drives plus the
/// single bus arbiter that serializes all transport access (I1).
pub struct DriveControlCore {
    registry: Registry,
    arbiter: BusArbiter,
    poller_metrics: PollerMetrics,
}

impl DriveControlCore {
    /// Build the core from the drive descriptors loaded at startup and a
    /// transport factory (real serial port or a test double). The bus is
    /// not yet initialized; call [`DriveControlCore::initialize`] before
    /// polling or commanding.
    #[must_use]
    pub fn new(descriptors: Vec<DriveDescriptor>, factory: TransportFactory) -> Self {
        Self {
            registry: Registry::new(descriptors),
            arbiter: BusArbiter::new(factory, DEFAULT_ACQUIRE_DEADLINE),
            poller_metrics: PollerMetrics::new(),
        }
    }

    /// Perform the initial transport construction (§4.9 step 4).
    pub async fn initialize(&self) -> Result<(), vfd_common::error::GatewayError> {
        self.arbiter.initialize().await
    }

    /// The drive registry and state mirror.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The bus arbiter.
    #[must_use]
    pub fn arbiter(&self) -> &BusArbiter {
        &self.arbiter
    }

    /// A command surface bound to this core's registry and arbiter.
    #[must_use]
    pub fn commands(&self) -> CommandSurface<'_> {
        CommandSurface::new(&self.registry, &self.arbiter)
    }

    /// This core's poll counters, for the `/metrics` endpoint.
    #[must_use]
    pub fn poller_metrics(&self) -> &PollerMetrics {
        &self.poller_metrics
    }

    /// Run the poller against this core until `shutdown` carries `true`.
    /// Intended to be spawned as its own task (§4.9 step 5).
    pub async fn run_poller(&self, shutdown: tokio::sync::watch::Receiver<bool>) {
        poller::run(&self.registry, &self.arbiter, &self.poller_metrics, shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfd_common::types::VfdModel;
    use vfd_transport::{MockTransport, Transport};

    fn descriptor(id: &str) -> DriveDescriptor {
        DriveDescriptor {
            id: id.to_string(),
            display_name: id.to_string(),
            slave_id: 1,
            model: VfdModel::Frenic,
        }
    }

    #[tokio::test]
    async fn core_initializes_and_exposes_registry_and_commands() {
        let factory: TransportFactory =
            Box::new(|| Ok(Box::new(MockTransport::new()) as Box<dyn Transport + Send>));
        let core = DriveControlCore::new(vec![descriptor("VFD1")], factory);

        core.initialize().await.unwrap();

        assert!(core.registry().has("VFD1"));
        let err = core.commands().set_frequency("NOPE", 1.0).await.unwrap_err();
        assert!(matches!(err, vfd_common::error::GatewayError::UnknownDrive(_)));
    }
}
