//! Function-Code Codec (C1): Frenic symbolic address encoding and the
//! scaled-quantity conversions that go with it.

use thiserror::Error;

/// Failures translating a symbolic function code to a register address.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The group letter isn't in the known table, or the code has no
    /// parseable numeric index.
    #[error("unknown function code: {0}")]
    UnknownCode(String),
    /// The index parsed but doesn't fit in 8 bits.
    #[error("function code index out of range: {0}")]
    IndexOutOfRange(String),
}

fn group_table(group: char) -> Option<u16> {
    match group {
        'F' => Some(0),
        'E' => Some(1),
        'C' => Some(2),
        'P' => Some(3),
        'H' => Some(4),
        'A' => Some(5),
        'o' => Some(6),
        'S' => Some(7),
        'M' => Some(8),
        'r' => Some(10),
        'J' => Some(13),
        'y' => Some(14),
        'W' => Some(15),
        'X' => Some(16),
        'Z' => Some(17),
        'b' => Some(18),
        'd' => Some(19),
        _ => None,
    }
}

/// Translate a Frenic function code such as `"M05"` into its 16-bit holding
/// register address: `(group_table[group] << 8) | index`.
pub fn encode_address(code: &str) -> Result<u16, CodecError> {
    let mut chars = code.chars();
    let group = chars.next().ok_or_else(|| CodecError::UnknownCode(code.to_string()))?;
    let index_str = chars.as_str();
    let group_value = group_table(group).ok_or_else(|| CodecError::UnknownCode(code.to_string()))?;
    let index: u32 = index_str
        .parse()
        .map_err(|_| CodecError::UnknownCode(code.to_string()))?;
    if index > u32::from(u8::MAX) {
        return Err(CodecError::IndexOutOfRange(code.to_string()));
    }
    Ok((group_value << 8) | index as u16)
}

/// Decode a raw M05-block frequency register (hundredths of Hz) to Hz.
#[must_use]
pub fn frequency_from_raw(raw: u16) -> f64 {
    f64::from(raw) / 100.0
}

/// Decode a raw voltage register (tenths of V) to V.
#[must_use]
pub fn voltage_from_raw(raw: u16) -> f64 {
    f64::from(raw) / 10.0
}

/// Decode a raw current or power register (hundredths) to physical units.
#[must_use]
pub fn hundredths_from_raw(raw: u16) -> f64 {
    f64::from(raw) / 100.0
}

/// Decode the `F03` max-frequency register (tenths of Hz) to an integer Hz
/// ceiling, truncating rather than rounding (§4.1).
#[must_use]
pub fn max_frequency_from_raw(raw: u16) -> u32 {
    u32::from(raw) / 10
}

/// Encode a frequency in Hz to the raw hundredths-of-Hz value written to
/// `S05`, per §4.5.2 / P2: `floor(freq_hz * 100)`.
#[must_use]
pub fn frequency_to_raw(freq_hz: f64) -> u16 {
    (freq_hz * 100.0).floor() as u16
}
