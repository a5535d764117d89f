//! Static attribute table and handle registration
//!
//! The table is fixed at compile time. Registration walks it once at boot,
//! validates it and hands out attribute handles in declaration order, the
//! same way a GATT server lays out its database:
//!
//! ```text
//! [service declaration]
//!   [characteristic declaration][value]            (read only)
//!   [characteristic declaration][value][CCCD]      (notifiable)
//! ```

use crate::config::gatt::MAX_CHARACTERISTICS;
use crate::gatt::uuids::{self, CharacteristicUuid, ServiceUuid};
use heapless::Vec;

/// Characteristic capability set
///
/// Bit values match the GATT characteristic properties field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties(u8);

impl Properties {
    pub const READ: Self = Self(0x02);
    pub const NOTIFY: Self = Self(0x10);
    pub const READ_NOTIFY: Self = Self(0x02 | 0x10);
    pub const NONE: Self = Self(0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn readable(self) -> bool {
        self.contains(Self::READ)
    }

    pub const fn notifiable(self) -> bool {
        self.contains(Self::NOTIFY)
    }
}

/// Compile-time characteristic definition
#[derive(Debug, Clone, Copy)]
pub struct CharacteristicDef {
    pub uuid: CharacteristicUuid,
    pub properties: Properties,
}

/// Compile-time service definition
#[derive(Debug, Clone, Copy)]
pub struct ServiceDef {
    pub uuid: ServiceUuid,
    pub characteristics: &'static [CharacteristicDef],
}

/// Handle of a characteristic value attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ValueHandle(pub u16);

/// Services exposed by the sensor node
pub static SERVICES: &[ServiceDef] = &[
    ServiceDef {
        uuid: uuids::DEVICE_INFORMATION,
        characteristics: &[
            CharacteristicDef { uuid: uuids::MANUFACTURER_NAME, properties: Properties::READ },
            CharacteristicDef { uuid: uuids::MODEL_NUMBER, properties: Properties::READ },
            CharacteristicDef { uuid: uuids::SERIAL_NUMBER, properties: Properties::READ },
            CharacteristicDef { uuid: uuids::FIRMWARE_REVISION, properties: Properties::READ },
            CharacteristicDef { uuid: uuids::HARDWARE_REVISION, properties: Properties::READ },
        ],
    },
    ServiceDef {
        uuid: uuids::BATTERY,
        characteristics: &[CharacteristicDef {
            uuid: uuids::BATTERY_LEVEL,
            properties: Properties::READ,
        }],
    },
    ServiceDef {
        uuid: uuids::ENVIRONMENTAL_SENSING,
        characteristics: &[CharacteristicDef {
            uuid: uuids::TEMPERATURE,
            properties: Properties::READ_NOTIFY,
        }],
    },
];

/// Reasons the attribute table is rejected at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// A service declares no characteristics
    EmptyService(ServiceUuid),
    /// The same characteristic type appears twice in one service
    DuplicateCharacteristic(ServiceUuid, CharacteristicUuid),
    /// A characteristic is neither readable nor notifiable
    NoCapabilities(CharacteristicUuid),
    /// More than one notifiable characteristic; the node pushes a single value
    MultipleNotifiable(CharacteristicUuid),
    /// More characteristics than [`MAX_CHARACTERISTICS`]
    TableFull,
    /// Ran past the last attribute handle
    HandleSpaceExhausted,
}

/// A characteristic after registration
#[derive(Debug, Clone, Copy)]
pub struct RegisteredCharacteristic {
    pub service: ServiceUuid,
    pub uuid: CharacteristicUuid,
    pub properties: Properties,
    /// Only assigned for notifiable characteristics
    pub value_handle: Option<ValueHandle>,
    /// Client characteristic configuration descriptor, notifiable only
    pub cccd_handle: Option<u16>,
}

/// Registered attribute table
#[derive(Debug, Clone)]
pub struct Registry {
    characteristics: Vec<RegisteredCharacteristic, MAX_CHARACTERISTICS>,
    notify_handle: Option<ValueHandle>,
    last_handle: u16,
}

impl Registry {
    /// Validate `services` and assign handles starting at `first_handle`.
    pub fn register(
        services: &[ServiceDef],
        first_handle: u16,
    ) -> Result<Self, RegistrationError> {
        let mut allocator = HandleAllocator { next: first_handle, last: 0 };
        let mut characteristics: Vec<RegisteredCharacteristic, MAX_CHARACTERISTICS> = Vec::new();
        let mut notify_handle = None;

        for service in services {
            if service.characteristics.is_empty() {
                return Err(RegistrationError::EmptyService(service.uuid));
            }
            allocator.take()?;

            for (index, def) in service.characteristics.iter().enumerate() {
                if service.characteristics[..index].iter().any(|c| c.uuid == def.uuid) {
                    return Err(RegistrationError::DuplicateCharacteristic(service.uuid, def.uuid));
                }
                if def.properties.is_empty() {
                    return Err(RegistrationError::NoCapabilities(def.uuid));
                }

                // declaration, then value
                allocator.take()?;
                let value = allocator.take()?;

                let (value_handle, cccd_handle) = if def.properties.notifiable() {
                    if notify_handle.is_some() {
                        return Err(RegistrationError::MultipleNotifiable(def.uuid));
                    }
                    let cccd = allocator.take()?;
                    notify_handle = Some(ValueHandle(value));
                    (Some(ValueHandle(value)), Some(cccd))
                } else {
                    (None, None)
                };

                characteristics
                    .push(RegisteredCharacteristic {
                        service: service.uuid,
                        uuid: def.uuid,
                        properties: def.properties,
                        value_handle,
                        cccd_handle,
                    })
                    .map_err(|_| RegistrationError::TableFull)?;
            }
        }

        Ok(Self {
            characteristics,
            notify_handle,
            last_handle: allocator.last,
        })
    }

    /// Value handle of the notifiable characteristic, if the table has one
    pub fn notify_handle(&self) -> Option<ValueHandle> {
        self.notify_handle
    }

    /// Find a registered characteristic by its (service, type) pair
    pub fn find(
        &self,
        service: ServiceUuid,
        uuid: CharacteristicUuid,
    ) -> Option<&RegisteredCharacteristic> {
        self.characteristics
            .iter()
            .find(|c| c.service == service && c.uuid == uuid)
    }

    /// Find the characteristic that owns a push value handle
    pub fn by_value_handle(&self, handle: ValueHandle) -> Option<&RegisteredCharacteristic> {
        self.characteristics
            .iter()
            .find(|c| c.value_handle == Some(handle))
    }

    pub fn characteristics(&self) -> &[RegisteredCharacteristic] {
        &self.characteristics
    }

    /// Highest handle used by the table
    pub fn last_handle(&self) -> u16 {
        self.last_handle
    }
}

struct HandleAllocator {
    next: u16,
    last: u16,
}

impl HandleAllocator {
    fn take(&mut self) -> Result<u16, RegistrationError> {
        // 0x0000 is reserved
        if self.next == 0 {
            return Err(RegistrationError::HandleSpaceExhausted);
        }
        let handle = self.next;
        self.next = self.next.wrapping_add(1);
        self.last = handle;
        Ok(handle)
    }
}
