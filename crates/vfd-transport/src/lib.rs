//! Modbus RTU transport: the framed serial client the Bus Arbiter owns.
//!
//! [`Transport`] is the seam the rest of the Drive Control Core depends on.
//! [`rtu::RtuTransport`] drives a real serial port; [`mock::MockTransport`]
//! is an in-memory stand-in used by tests and by any pluggable-transport
//! caller that doesn't want a real port.

pub mod crc;
pub mod frame;
pub mod mock;
pub mod rtu;

pub use mock::{MockResponse, MockTransport};
pub use rtu::{RtuConfig, RtuTransport};
pub use vfd_common::error::TransportError;

use async_trait::async_trait;
use std::time::Duration;

/// The two Modbus operations the Drive Control Core needs: reading a block
/// of holding registers and writing a single holding register (§4.2).
#[async_trait]
pub trait Transport: Send {
    /// Read `count` consecutive holding registers starting at `address` from
    /// `slave_id`, failing if no response arrives within `timeout`.
    async fn read_holding(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
        timeout: Duration,
    ) -> Result<Vec<u16>, TransportError>;

    /// Write a single holding register at `address` on `slave_id`.
    async fn write_holding(
        &mut self,
        slave_id: u8,
        address: u16,
        value: u16,
        timeout: Duration,
    ) -> Result<(), TransportError>;
}
