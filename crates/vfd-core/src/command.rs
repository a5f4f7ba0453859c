//! Command Surface (C6): the externally callable drive operations, with
//! input validation (I3) and the bounded retry policy (§4.5.3).

use crate::arbiter::BusArbiter;
use crate::codec::{encode_address, frequency_to_raw};
use crate::registry::Registry;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use vfd_common::error::{GatewayError, GatewayResult};
use vfd_common::types::DriveMode;

const MAX_ATTEMPTS: u32 = 11;
const COMMAND_TIMEOUT: Duration = Duration::from_millis(400);
const MAX_SUPPORTED_FREQUENCY_HZ: f64 = 120.0;

/// Inter-attempt delay for attempt `k` (1-indexed): `((k-1) mod 3) * 100ms`,
/// i.e. 0, 100, 200, 0, 100, 200, ... (§4.5.3).
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_millis(u64::from((attempt - 1) % 3) * 100)
}

/// Run `op` up to [`MAX_ATTEMPTS`] times, sleeping [`retry_delay`] between
/// attempts. On the 11th consecutive failure the caller observes the
/// underlying error (§4.5.3).
async fn with_retry<F, Fut, T>(mut op: F) -> GatewayResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = GatewayResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt >= MAX_ATTEMPTS => {
                warn!(attempt, %err, "command exhausted retry budget");
                return Err(err);
            }
            Err(err) => {
                debug!(attempt, %err, "command attempt failed, retrying");
                sleep(retry_delay(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// Thin façade over the Bus Arbiter enforcing §3 I3 and translating
/// transport errors into the error taxonomy (§7).
pub struct CommandSurface<'a> {
    registry: &'a Registry,
    arbiter: &'a BusArbiter,
}

impl<'a> CommandSurface<'a> {
    /// Build a command surface over the given registry and arbiter.
    #[must_use]
    pub fn new(registry: &'a Registry, arbiter: &'a BusArbiter) -> Self {
        Self { registry, arbiter }
    }

    fn require_known_supported(&self, id: &str) -> GatewayResult<u8> {
        let descriptor = self
            .registry
            .get_descriptor(id)
            .ok_or_else(|| GatewayError::UnknownDrive(id.to_string()))?;
        if !self.registry.is_supported(id) {
            return Err(GatewayError::UnsupportedModel(descriptor.model.to_string()));
        }
        Ok(descriptor.slave_id)
    }

    /// Command a target frequency, enforcing `0 <= freq_hz <= 120` and
    /// `freq_hz <= max_frequency` (I3), then writing `S05` with retry.
    pub async fn set_frequency(&self, id: &str, freq_hz: f64) -> GatewayResult<()> {
        let slave_id = self.require_known_supported(id)?;
        let max_frequency = self
            .registry
            .get_state(id)
            .map(|s| f64::from(s.max_frequency))
            .unwrap_or(0.0);
        if !(0.0..=MAX_SUPPORTED_FREQUENCY_HZ).contains(&freq_hz) || freq_hz > max_frequency {
            return Err(GatewayError::InvalidCommand(format!(
                "frequency {freq_hz} out of range [0, {max_frequency}]"
            )));
        }
        let address = encode_address("S05")
            .map_err(|e| GatewayError::InvalidCommand(e.to_string()))?;
        let value = frequency_to_raw(freq_hz);

        with_retry(|| async {
            self.arbiter
                .with_transport(|t| t.write_holding(slave_id, address, value, COMMAND_TIMEOUT))
                .await
        })
        .await?;

        self.registry.update_state(id, |s| s.tgt_frequency = freq_hz);
        Ok(())
    }

    /// Command a run state. `OFFLINE` (and any unrecognized mode) is
    /// rejected as `InvalidCommand`; FORWARD/REVERSE/STOP are written to
    /// `S06` with retry.
    pub async fn set_drive_mode(&self, id: &str, mode: DriveMode) -> GatewayResult<()> {
        let slave_id = self.require_known_supported(id)?;
        let value = mode
            .to_command_word()
            .ok_or_else(|| GatewayError::InvalidCommand(format!("{mode:?} is not a valid command")))?;
        let address = encode_address("S06")
            .map_err(|e| GatewayError::InvalidCommand(e.to_string()))?;

        with_retry(|| async {
            self.arbiter
                .with_transport(|t| t.write_holding(slave_id, address, value, COMMAND_TIMEOUT))
                .await
        })
        .await?;

        self.registry.update_state(id, |s| s.tgt_drive_mode = mode);
        Ok(())
    }

    /// Clear the drive's alarm by writing `0x8000` to `S06`. No mirror
    /// update (§4.5.2).
    pub async fn clear_alarm(&self, id: &str) -> GatewayResult<()> {
        let slave_id = self.require_known_supported(id)?;
        let address = encode_address("S06")
            .map_err(|e| GatewayError::InvalidCommand(e.to_string()))?;

        with_retry(|| async {
            self.arbiter
                .with_transport(|t| t.write_holding(slave_id, address, 0x8000, COMMAND_TIMEOUT))
                .await
        })
        .await
    }

    /// Raw register read escape hatch used by the external adapter. Uses a
    /// 10s timeout rather than the 400ms command/poller deadline (§9c), and
    /// is not retried — it's an operator-driven diagnostic read, not a
    /// control action.
    pub async fn read_registers(&self, id: &str, start_code: &str, count: u16) -> GatewayResult<Vec<u16>> {
        let slave_id = self.require_known_supported(id)?;
        let address =
            encode_address(start_code).map_err(|e| GatewayError::InvalidCommand(e.to_string()))?;

        self.arbiter
            .with_transport(|t| t.read_holding(slave_id, address, count, Duration::from_secs(10)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbiter::TransportFactory;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;
    use vfd_common::types::{DriveDescriptor, VfdModel};
    use vfd_transport::{MockResponse, MockTransport, Transport};
    use vfd_common::error::TransportError;

    /// Wraps a shared `MockTransport` so the arbiter's "fresh transport"
    /// factory can hand out a handle to the same underlying state rather
    /// than resetting it, which is what production `initialize()` does but
    /// would defeat tests that pre-script responses before registration.
    struct SharedMock(Arc<AsyncMutex<MockTransport>>);

    #[async_trait::async_trait]
    impl Transport for SharedMock {
        async fn read_holding(
            &mut self,
            slave_id: u8,
            address: u16,
            count: u16,
            timeout: Duration,
        ) -> Result<Vec<u16>, TransportError> {
            self.0.lock().await.read_holding(slave_id, address, count, timeout).await
        }

        async fn write_holding(
            &mut self,
            slave_id: u8,
            address: u16,
            value: u16,
            timeout: Duration,
        ) -> Result<(), TransportError> {
            self.0.lock().await.write_holding(slave_id, address, value, timeout).await
        }
    }

    fn descriptor(id: &str) -> DriveDescriptor {
        DriveDescriptor {
            id: id.to_string(),
            display_name: "test".to_string(),
            slave_id: 1,
            model: VfdModel::Frenic,
        }
    }

    fn harness(shared: Arc<AsyncMutex<MockTransport>>) -> (Registry, BusArbiter) {
        let registry = Registry::new(vec![descriptor("VFD1")]);
        let factory: TransportFactory = Box::new(move || {
            Ok(Box::new(SharedMock(Arc::clone(&shared))) as Box<dyn Transport + Send>)
        });
        let arbiter = BusArbiter::new(factory, Duration::from_millis(400));
        (registry, arbiter)
    }

    #[tokio::test]
    async fn set_frequency_rejects_above_120_without_bus_traffic() {
        let shared = Arc::new(AsyncMutex::new(MockTransport::new()));
        let (registry, arbiter) = harness(shared);
        arbiter.initialize().await.unwrap();
        // Give the drive headroom so only the 120Hz ceiling is exercised.
        registry.update_state("VFD1", |s| s.max_frequency = 200);
        let surface = CommandSurface::new(&registry, &arbiter);

        let err = surface.set_frequency("VFD1", 150.0).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidCommand(_)));
    }

    #[tokio::test]
    async fn set_frequency_writes_encoded_value_and_updates_mirror() {
        let shared = Arc::new(AsyncMutex::new(MockTransport::new()));
        let (registry, arbiter) = harness(Arc::clone(&shared));
        arbiter.initialize().await.unwrap();
        registry.update_state("VFD1", |s| s.max_frequency = 60);
        let surface = CommandSurface::new(&registry, &arbiter);

        surface.set_frequency("VFD1", 42.5).await.unwrap();

        let s05 = encode_address("S05").unwrap();
        let written = shared.lock().await.read_holding(1, s05, 1, Duration::from_millis(400)).await.unwrap();
        assert_eq!(written, vec![4250]);
        assert_eq!(registry.get_state("VFD1").unwrap().tgt_frequency, 42.5);
    }

    #[tokio::test]
    async fn clear_alarm_writes_expected_value() {
        let shared = Arc::new(AsyncMutex::new(MockTransport::new()));
        let (registry, arbiter) = harness(Arc::clone(&shared));
        arbiter.initialize().await.unwrap();
        let surface = CommandSurface::new(&registry, &arbiter);

        surface.clear_alarm("VFD1").await.unwrap();

        let s06 = encode_address("S06").unwrap();
        let written = shared.lock().await.read_holding(1, s06, 1, Duration::from_millis(400)).await.unwrap();
        assert_eq!(written, vec![0x8000]);
    }

    #[tokio::test]
    async fn unknown_drive_is_rejected_before_touching_bus() {
        let shared = Arc::new(AsyncMutex::new(MockTransport::new()));
        let (registry, arbiter) = harness(shared);
        arbiter.initialize().await.unwrap();
        let surface = CommandSurface::new(&registry, &arbiter);

        let err = surface.set_frequency("NOPE", 10.0).await.unwrap_err();
        assert!(matches!(err, GatewayError::UnknownDrive(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_resolves_after_transient_failures_per_scenario_5() {
        let shared = Arc::new(AsyncMutex::new(MockTransport::new()));
        {
            let mut guard = shared.lock().await;
            guard.push_script(1, MockResponse::Fail(TransportError::Timeout));
            guard.push_script(1, MockResponse::Fail(TransportError::Timeout));
            guard.push_script(1, MockResponse::Fail(TransportError::Timeout));
            guard.push_script(1, MockResponse::WriteOk);
        }
        let (registry, arbiter) = harness(Arc::clone(&shared));
        arbiter.initialize().await.unwrap();
        let surface = CommandSurface::new(&registry, &arbiter);

        surface.clear_alarm("VFD1").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_eleven_attempts() {
        let shared = Arc::new(AsyncMutex::new(MockTransport::new()));
        {
            let mut guard = shared.lock().await;
            for _ in 0..11 {
                guard.push_script(1, MockResponse::Fail(TransportError::Timeout));
            }
        }
        let (registry, arbiter) = harness(shared);
        arbiter.initialize().await.unwrap();
        let surface = CommandSurface::new(&registry, &arbiter);

        let err = surface.clear_alarm("VFD1").await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(TransportError::Timeout)));
    }
}
