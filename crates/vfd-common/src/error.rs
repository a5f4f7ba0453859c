//! Error taxonomy for the Drive Control Core.
//!
//! Bus-level failures are represented by [`TransportError`] and nested inside
//! [`GatewayError::Transport`]; everything above the transport layer matches
//! on [`GatewayError`] directly.

use thiserror::Error;

/// Bus-level failure kinds surfaced by the Modbus RTU transport.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The per-call deadline elapsed before a response arrived.
    #[error("transport timeout")]
    Timeout,
    /// The response frame's CRC-16 did not match its payload.
    #[error("CRC mismatch in response frame")]
    Crc,
    /// The response frame was malformed (short, wrong function code, bad length).
    #[error("malformed response frame")]
    Framing,
    /// The slave returned a Modbus exception response.
    #[error("slave exception 0x{0:02x}")]
    SlaveException(u8),
    /// The serial port itself is not open (device missing, permission denied).
    #[error("serial port closed")]
    PortClosed,
}

/// Errors surfaced by the Drive Control Core and its external adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The referenced drive id is not registered.
    #[error("unknown drive: {0}")]
    UnknownDrive(String),
    /// The requested command is invalid: out-of-range frequency, invalid
    /// mode, or a function-code codec failure.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    /// The drive's configured model is registered but has no implementation.
    #[error("unsupported drive model: {0}")]
    UnsupportedModel(String),
    /// A bus-level failure, possibly after exhausting the retry policy.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The bus arbiter's acquisition deadline elapsed.
    #[error("bus busy")]
    BusBusy,
    /// The bus transport has not been initialized yet.
    #[error("transport not initialized")]
    NotInitialized,
}

/// Convenience alias for `Result<T, GatewayError>`.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_displays_exception_code_in_hex() {
        let err = TransportError::SlaveException(0x04);
        assert_eq!(err.to_string(), "slave exception 0x04");
    }

    #[test]
    fn gateway_error_wraps_transport_error() {
        let err: GatewayError = TransportError::Timeout.into();
        assert!(matches!(err, GatewayError::Transport(TransportError::Timeout)));
    }
}
