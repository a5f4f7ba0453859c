//! Shared types for the VFD supervisory gateway: the drive data model,
//! the error taxonomy, and the YAML configuration loader.

pub mod config;
pub mod error;
pub mod types;

pub use config::{DeviceConfig, GatewayConfig};
pub use error::{GatewayError, GatewayResult, TransportError};
pub use types::{DriveDescriptor, DriveMode, DriveState, VfdModel};
