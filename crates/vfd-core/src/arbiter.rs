//! Bus Arbiter (C3): the single exclusive owner of the Modbus transport.

use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};
use vfd_common::error::{GatewayError, TransportError};
use vfd_transport::Transport;

/// Builds a fresh transport handle. Called at startup and on recovery
/// (§4.3). Synchronous because opening a serial port (or constructing a
/// mock) does not itself need to suspend.
pub type TransportFactory = Box<dyn Fn() -> Result<Box<dyn Transport + Send>, TransportError> + Send + Sync>;

/// Owns the single transport handle and the mutual-exclusion primitive all
/// bus access is funneled through (I1). The primitive is a `tokio::sync::Mutex`
/// rather than an OS lock, per §5/§9: this gateway's cooperative scheduler
/// must be able to suspend a command task while a poll holds the bus.
pub struct BusArbiter {
    factory: TransportFactory,
    transport: Mutex<Option<Box<dyn Transport + Send>>>,
    acquire_deadline: Duration,
}

impl BusArbiter {
    /// Create an arbiter with no transport yet open. `acquire_deadline`
    /// bounds how long a caller waits for the exclusive primitive before
    /// observing `BusBusy` (§4.3).
    pub fn new(factory: TransportFactory, acquire_deadline: Duration) -> Self {
        Self {
            factory,
            transport: Mutex::new(None),
            acquire_deadline,
        }
    }

    /// (Re)build the transport from the configured source, replacing any
    /// existing handle atomically. Idempotent; safe to call repeatedly.
    pub async fn initialize(&self) -> Result<(), GatewayError> {
        let transport = (self.factory)()?;
        let mut guard = self.transport.lock().await;
        *guard = Some(transport);
        info!("bus transport (re)initialized");
        Ok(())
    }

    /// Whether the transport has been initialized at least once.
    pub async fn is_initialized(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    /// Acquire exclusive access to the transport and run `op` against it.
    /// The primitive is released on every exit path, including `op`
    /// returning an error. If the primitive isn't available within the
    /// configured deadline, returns `BusBusy` rather than queueing
    /// indefinitely (§4.3).
    pub async fn with_transport<F, Fut, T>(&self, op: F) -> Result<T, GatewayError>
    where
        F: FnOnce(&mut (dyn Transport + Send)) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut guard = match timeout(self.acquire_deadline, self.transport.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                warn!("bus arbiter acquisition deadline exceeded");
                return Err(GatewayError::BusBusy);
            }
        };
        let transport = guard.as_deref_mut().ok_or(GatewayError::NotInitialized)?;
        op(transport).await.map_err(GatewayError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vfd_transport::MockTransport;

    fn mock_factory() -> TransportFactory {
        Box::new(|| Ok(Box::new(MockTransport::new()) as Box<dyn Transport + Send>))
    }

    #[tokio::test]
    async fn fresh_arbiter_is_not_initialized() {
        let arbiter = BusArbiter::new(mock_factory(), Duration::from_millis(400));
        assert!(!arbiter.is_initialized().await);
    }

    #[tokio::test]
    async fn initialize_makes_transport_available() {
        let arbiter = BusArbiter::new(mock_factory(), Duration::from_millis(400));
        arbiter.initialize().await.unwrap();
        assert!(arbiter.is_initialized().await);
    }

    #[tokio::test]
    async fn with_transport_before_initialize_is_not_initialized_error() {
        let arbiter = BusArbiter::new(mock_factory(), Duration::from_millis(400));
        let result = arbiter
            .with_transport(|t| t.read_holding(1, 0, 1, Duration::from_millis(400)))
            .await;
        assert_eq!(result.unwrap_err(), GatewayError::NotInitialized);
    }

    #[tokio::test]
    async fn with_transport_runs_op_against_current_transport() {
        let arbiter = BusArbiter::new(mock_factory(), Duration::from_millis(400));
        arbiter.initialize().await.unwrap();
        let result = arbiter
            .with_transport(|t| t.write_holding(1, 5, 42, Duration::from_millis(400)))
            .await;
        assert!(result.is_ok());
    }
}
