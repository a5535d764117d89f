//! Bluetooth Low Energy module
//!
//! GATT service definitions for the trouble-host attribute server.

pub mod service;

pub use service::{BatteryService, DeviceInformationService, EnvironmentalSensingService};
