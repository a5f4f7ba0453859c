//! YAML startup configuration.
//!
//! The gateway is configured by a single YAML document naming the serial
//! path and the drives reachable on it. The format is mandated by the
//! external interface this gateway replaces, not a style choice.

use crate::types::{DriveDescriptor, VfdModel};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

fn default_baud_rate() -> u32 {
    9600
}

/// One entry of `modbus_devices` in the configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Device kind. Only `"VFD"` is operative; anything else is skipped.
    #[serde(rename = "type")]
    pub kind: String,
    /// Modbus unit address, 1..=247.
    pub slave_id: u8,
    /// Human-readable label.
    pub display_name: String,
    /// Used as the drive id.
    pub name: String,
    /// Drive family tag, e.g. `"Frenic"`.
    pub model: String,
}

/// Top-level gateway configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Serial device path (e.g. `/dev/ttyUSB0`) or a virtual port URL for tests.
    pub modbus_path: String,
    /// Serial baud rate. Defaults to 9600, the Frenic line default.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// The drives registered on this bus.
    #[serde(default)]
    pub modbus_devices: Vec<DeviceConfig>,
}

/// Failure loading or parsing the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file's contents are not valid YAML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl GatewayConfig {
    /// Load and parse a configuration document from `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parse a configuration document from an in-memory YAML string.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Translate the configured devices into drive descriptors, skipping
    /// (and warning about) any entry whose `type` is not `"VFD"` (§4.8).
    #[must_use]
    pub fn drive_descriptors(&self) -> Vec<DriveDescriptor> {
        self.modbus_devices
            .iter()
            .filter_map(|device| {
                if device.kind != "VFD" {
                    warn!(
                        name = %device.name,
                        kind = %device.kind,
                        "skipping modbus_devices entry with unrecognized type"
                    );
                    return None;
                }
                Some(DriveDescriptor {
                    id: device.name.clone(),
                    display_name: device.display_name.clone(),
                    slave_id: device.slave_id,
                    model: VfdModel::parse(&device.model),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r"
modbus_path: /dev/ttyUSB0
modbus_devices:
  - type: VFD
    slave_id: 1
    display_name: Fan 1
    name: VFD1
    model: Frenic
  - type: PLC
    slave_id: 2
    display_name: Unrelated
    name: OTHER1
    model: Frenic
";

    #[test]
    fn parses_sample_document() {
        let cfg = GatewayConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.modbus_path, "/dev/ttyUSB0");
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.modbus_devices.len(), 2);
    }

    #[test]
    fn skips_non_vfd_devices() {
        let cfg = GatewayConfig::from_yaml(SAMPLE).unwrap();
        let descriptors = cfg.drive_descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].id, "VFD1");
    }

    #[test]
    fn honors_explicit_baud_rate() {
        let yaml = "modbus_path: /dev/ttyUSB0\nbaud_rate: 19200\nmodbus_devices: []\n";
        let cfg = GatewayConfig::from_yaml(yaml).unwrap();
        assert_eq!(cfg.baud_rate, 19200);
    }

    #[test]
    fn rejects_missing_modbus_path() {
        let err = GatewayConfig::from_yaml("modbus_devices: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
