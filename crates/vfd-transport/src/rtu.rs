//! The production transport: Modbus RTU framing over a real serial port.

use crate::frame::{decode_read_response, decode_write_response, encode_read_holding, encode_write_holding};
use crate::Transport;
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::debug;
use vfd_common::error::TransportError;

/// Serial line parameters. Defaults match the fixed parameters §4.2
/// mandates for the supported drive family: 9600 baud, even parity, 8 data
/// bits, 1 stop bit.
#[derive(Debug, Clone)]
pub struct RtuConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub path: String,
    /// Baud rate.
    pub baud_rate: u32,
}

impl Default for RtuConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud_rate: 9600,
        }
    }
}

/// A Modbus RTU transport driving a real serial port.
///
/// Not reentrant (§4.2): the Bus Arbiter is this type's only caller, and
/// holds it behind its exclusive-access primitive.
pub struct RtuTransport {
    port: SerialStream,
}

impl RtuTransport {
    /// Open the serial port described by `config`.
    pub fn open(config: &RtuConfig) -> Result<Self, TransportError> {
        let port = tokio_serial::new(&config.path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::Even)
            .stop_bits(StopBits::One)
            .open_native_async()
            .map_err(|_| TransportError::PortClosed)?;
        Ok(Self { port })
    }

    async fn read_response_header(&mut self, min_fixed_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut header = vec![0u8; min_fixed_len];
        self.port
            .read_exact(&mut header)
            .await
            .map_err(|_| TransportError::PortClosed)?;
        Ok(header)
    }
}

#[async_trait]
impl Transport for RtuTransport {
    async fn read_holding(
        &mut self,
        slave_id: u8,
        address: u16,
        count: u16,
        timeout: Duration,
    ) -> Result<Vec<u16>, TransportError> {
        let request = encode_read_holding(slave_id, address, count);
        let op = async {
            self.port
                .write_all(&request)
                .await
                .map_err(|_| TransportError::PortClosed)?;

            // slave_id, function_code, (byte_count|exception_code)
            let header = self.read_response_header(3).await?;
            let total_len = if header[1] & 0x80 != 0 {
                5
            } else {
                3 + header[2] as usize + 2
            };

            let mut frame = header;
            let mut rest = vec![0u8; total_len - frame.len()];
            self.port
                .read_exact(&mut rest)
                .await
                .map_err(|_| TransportError::PortClosed)?;
            frame.extend_from_slice(&rest);

            debug!(slave_id, address, count, "read_holding response received");
            decode_read_response(&frame, slave_id, count)
        };

        tokio::time::timeout(timeout, op)
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    async fn write_holding(
        &mut self,
        slave_id: u8,
        address: u16,
        value: u16,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let request = encode_write_holding(slave_id, address, value);
        let op = async {
            self.port
                .write_all(&request)
                .await
                .map_err(|_| TransportError::PortClosed)?;

            // slave_id, function_code
            let header = self.read_response_header(2).await?;
            let total_len = if header[1] & 0x80 != 0 { 5 } else { 8 };

            let mut frame = header;
            let mut rest = vec![0u8; total_len - frame.len()];
            self.port
                .read_exact(&mut rest)
                .await
                .map_err(|_| TransportError::PortClosed)?;
            frame.extend_from_slice(&rest);

            debug!(slave_id, address, value, "write_holding response received");
            decode_write_response(&frame, slave_id, address, value)
        };

        tokio::time::timeout(timeout, op)
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
