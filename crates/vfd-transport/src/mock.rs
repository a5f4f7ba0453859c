//! In-memory transport for tests and for exercising the Drive Control Core
//! without a real serial port (the Non-goal-exempt "pluggable transport").

use crate::Transport;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use vfd_common::error::TransportError;

/// A scripted failure/response a [`MockTransport`] call consumes.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return these registers from the next `read_holding` call.
    Registers(Vec<u16>),
    /// Accept the next `write_holding` call.
    WriteOk,
    /// Fail the next call with this transport error.
    Fail(TransportError),
}

/// A transport backed by in-process register storage and an optional
/// per-slave script of scripted responses, for deterministic tests of the
/// Poller, Command Surface, and Bus Arbiter.
#[derive(Debug, Default)]
pub struct MockTransport {
    registers: HashMap<(u8, u16), u16>,
    scripts: HashMap<u8, VecDeque<MockResponse>>,
}

impl MockTransport {
    /// Create an empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a holding register value for `slave_id` at `address`, used
    /// when no script entry is queued for that slave.
    pub fn set_register(&mut self, slave_id: u8, address: u16, value: u16) {
        self.registers.insert((slave_id, address), value);
    }

    /// Queue a scripted response for the next call addressed to `slave_id`.
    /// Scripts are consumed in FIFO order; once empty, calls fall back to
    /// `registers`.
    pub fn push_script(&mut self, slave_id: u8, response: MockResponse) {
        self.scripts.entry(slave_id).or_default().push_back(response);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn read_holding(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
        _timeout: Duration,
    ) -> Result<Vec<u16>, TransportError> {
        if let Some(script) = self.scripts.get_mut(&slave_id) {
            if let Some(response) = script.pop_front() {
                return match response {
                    MockResponse::Registers(regs) => Ok(regs),
                    MockResponse::Fail(err) => Err(err),
                    MockResponse::WriteOk => Err(TransportError::Framing),
                };
            }
        }
        Ok((0..count)
            .map(|i| {
                self.registers
                    .get(&(slave_id, address + i))
                    .copied()
                    .unwrap_or(0)
            })
            .collect())
    }

    async fn write_holding(
        &mut self,
        slave_id: u8,
        address: u16,
        value: u16,
        _timeout: Duration,
    ) -> Result<(), TransportError> {
        if let Some(script) = self.scripts.get_mut(&slave_id) {
            if let Some(response) = script.pop_front() {
                return match response {
                    MockResponse::WriteOk => {
                        self.registers.insert((slave_id, address), value);
                        Ok(())
                    }
                    MockResponse::Fail(err) => Err(err),
                    MockResponse::Registers(_) => Err(TransportError::Framing),
                };
            }
        }
        self.registers.insert((slave_id, address), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_returns_preloaded_registers() {
        let mut mock = MockTransport::new();
        mock.set_register(1, 5, 42);
        let regs = mock
            .read_holding(1, 5, 1, Duration::from_millis(400))
            .await
            .unwrap();
        assert_eq!(regs, vec![42]);
    }

    #[tokio::test]
    async fn write_then_read_observes_the_write() {
        let mut mock = MockTransport::new();
        mock.write_holding(1, 10, 99, Duration::from_millis(400))
            .await
            .unwrap();
        let regs = mock
            .read_holding(1, 10, 1, Duration::from_millis(400))
            .await
            .unwrap();
        assert_eq!(regs, vec![99]);
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let mut mock = MockTransport::new();
        mock.push_script(1, MockResponse::Fail(TransportError::Timeout));
        mock.push_script(1, MockResponse::Fail(TransportError::Timeout));
        mock.push_script(1, MockResponse::WriteOk);

        assert_eq!(
            mock.write_holding(1, 0, 1, Duration::from_millis(400))
                .await
                .unwrap_err(),
            TransportError::Timeout
        );
        assert_eq!(
            mock.write_holding(1, 0, 1, Duration::from_millis(400))
                .await
                .unwrap_err(),
            TransportError::Timeout
        );
        assert!(mock
            .write_holding(1, 0, 1, Duration::from_millis(400))
            .await
            .is_ok());
    }
}
