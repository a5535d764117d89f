//! Bluetooth SIG assigned 16-bit UUIDs used by the attribute table

/// 16-bit service type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceUuid(pub u16);

/// 16-bit characteristic type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicUuid(pub u16);

impl ServiceUuid {
    /// Little-endian encoding as carried over the air
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl CharacteristicUuid {
    /// Little-endian encoding as carried over the air
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

pub const DEVICE_INFORMATION: ServiceUuid = ServiceUuid(0x180A);
pub const BATTERY: ServiceUuid = ServiceUuid(0x180F);
pub const ENVIRONMENTAL_SENSING: ServiceUuid = ServiceUuid(0x181A);

pub const MANUFACTURER_NAME: CharacteristicUuid = CharacteristicUuid(0x2A29);
pub const MODEL_NUMBER: CharacteristicUuid = CharacteristicUuid(0x2A24);
pub const SERIAL_NUMBER: CharacteristicUuid = CharacteristicUuid(0x2A25);
pub const FIRMWARE_REVISION: CharacteristicUuid = CharacteristicUuid(0x2A26);
pub const HARDWARE_REVISION: CharacteristicUuid = CharacteristicUuid(0x2A27);
pub const BATTERY_LEVEL: CharacteristicUuid = CharacteristicUuid(0x2A19);
pub const TEMPERATURE: CharacteristicUuid = CharacteristicUuid(0x2A6E);
