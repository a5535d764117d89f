//! GATT services exposed over the air
//!
//! Characteristic values held by the attribute server are refreshed from the
//! node's read router right before each read is accepted, so the initial
//! values here only matter until the first read.

use trouble_host::prelude::*;

use crate::gatt::AttValue;

/// Device Information service (0x180A)
#[gatt_service(uuid = "0x180a")]
pub struct DeviceInformationService {
    #[characteristic(uuid = "0x2a29", read)]
    pub manufacturer_name: AttValue,

    #[characteristic(uuid = "0x2a24", read)]
    pub model_number: AttValue,

    #[characteristic(uuid = "0x2a25", read)]
    pub serial_number: AttValue,

    #[characteristic(uuid = "0x2a26", read)]
    pub firmware_revision: AttValue,

    #[characteristic(uuid = "0x2a27", read)]
    pub hardware_revision: AttValue,
}

/// Battery service (0x180F)
#[gatt_service(uuid = "0x180f")]
pub struct BatteryService {
    #[characteristic(uuid = "0x2a19", read)]
    pub level: u8,
}

/// Environmental Sensing service (0x181A)
#[gatt_service(uuid = "0x181a")]
pub struct EnvironmentalSensingService {
    /// Hundredths of a degree Celsius
    #[characteristic(uuid = "0x2a6e", read, notify)]
    pub temperature: i16,
}
