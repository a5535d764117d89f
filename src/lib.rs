#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod gatt;
pub mod link;
pub mod node;
pub mod notify;
pub mod sensor;
pub mod shell;

// These modules depend on embassy/esp-hal features only available with embedded feature
#[cfg(feature = "embedded")]
pub mod ble;
#[cfg(feature = "embedded")]
pub mod tasks;
