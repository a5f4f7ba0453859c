//! Modbus RTU frame encoding and decoding.
//!
//! Wire shape: `slave_id (1B) | function_code (1B) | payload | CRC-16 (2B, LE)`.
//! Read-holding payload is `address (2B BE) | quantity (2B BE)`; its response
//! payload is `byte_count (1B) | registers (2B BE each)`. Write-single payload
//! and response are both `address (2B BE) | value (2B BE)` (echoed). A
//! response with the function code's high bit set is an exception frame:
//! `function | 0x80, exception_code`.

use crate::crc::{append_crc, verify_crc};
use vfd_common::error::TransportError;

const FC_READ_HOLDING: u8 = 0x03;
const FC_WRITE_SINGLE: u8 = 0x06;
const EXCEPTION_BIT: u8 = 0x80;

/// Build a read-holding-registers request frame.
#[must_use]
pub fn encode_read_holding(slave_id: u8, address: u16, count: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(slave_id);
    frame.push(FC_READ_HOLDING);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&count.to_be_bytes());
    append_crc(&mut frame);
    frame
}

/// Build a write-single-register request frame.
#[must_use]
pub fn encode_write_holding(slave_id: u8, address: u16, value: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8);
    frame.push(slave_id);
    frame.push(FC_WRITE_SINGLE);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.extend_from_slice(&value.to_be_bytes());
    append_crc(&mut frame);
    frame
}

fn check_exception(frame: &[u8], request_fc: u8) -> Result<(), TransportError> {
    if frame.len() >= 2 && frame[1] == (request_fc | EXCEPTION_BIT) {
        return Err(TransportError::SlaveException(frame[2]));
    }
    Ok(())
}

/// Decode a read-holding-registers response, validating CRC, slave id,
/// function code, and that the byte count matches the requested quantity.
pub fn decode_read_response(
    frame: &[u8],
    expected_slave: u8,
    expected_count: u16,
) -> Result<Vec<u16>, TransportError> {
    if frame.len() < 5 {
        return Err(TransportError::Framing);
    }
    if !verify_crc(frame) {
        return Err(TransportError::Crc);
    }
    check_exception(frame, FC_READ_HOLDING)?;
    if frame[0] != expected_slave || frame[1] != FC_READ_HOLDING {
        return Err(TransportError::Framing);
    }
    let byte_count = frame[2] as usize;
    if byte_count != expected_count as usize * 2 || frame.len() != 3 + byte_count + 2 {
        return Err(TransportError::Framing);
    }
    let registers = frame[3..3 + byte_count]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    Ok(registers)
}

/// Decode a write-single-register response, validating that it echoes the
/// request exactly (address and value), per the Modbus spec.
pub fn decode_write_response(
    frame: &[u8],
    expected_slave: u8,
    expected_address: u16,
    expected_value: u16,
) -> Result<(), TransportError> {
    if frame.len() < 5 {
        return Err(TransportError::Framing);
    }
    if !verify_crc(frame) {
        return Err(TransportError::Crc);
    }
    check_exception(frame, FC_WRITE_SINGLE)?;
    if frame.len() != 8 || frame[0] != expected_slave || frame[1] != FC_WRITE_SINGLE {
        return Err(TransportError::Framing);
    }
    let address = u16::from_be_bytes([frame[2], frame[3]]);
    let value = u16::from_be_bytes([frame[4], frame[5]]);
    if address != expected_address || value != expected_value {
        return Err(TransportError::Framing);
    }
    Ok(())
}
