//! Attribute read router
//!
//! Reads are dispatched through a fixed table keyed by (service,
//! characteristic type). Each entry points to a plain function that builds the
//! value from the device identity, the battery level or a fresh measurement.
//! The router holds no connection state and answers reads whether or not a
//! client has subscribed.

use crate::config::gatt::MAX_VALUE_LEN;
use crate::config::{battery, identity};
use crate::gatt::uuids::{self, CharacteristicUuid, ServiceUuid};
use crate::sensor::payload::TemperaturePayload;
use crate::sensor::traits::MeasurementSource;
use heapless::Vec;

/// Value returned by a successful read
pub type AttValue = Vec<u8, MAX_VALUE_LEN>;

/// ATT error code "Unlikely Error"
pub const ATT_ERR_UNLIKELY: u8 = 0x0E;
/// ATT error code "Insufficient Resources"
pub const ATT_ERR_INSUFFICIENT_RESOURCES: u8 = 0x11;

/// Errors reported back to the client as ATT error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttError {
    /// No read handler for this (service, characteristic) pair
    AttributeNotFound,
    /// Value did not fit the response buffer
    ResourceExhausted,
    /// The measurement source failed or returned an unencodable reading
    SensorUnavailable,
}

impl AttError {
    /// ATT protocol error code sent in the error response
    pub fn code(self) -> u8 {
        match self {
            AttError::AttributeNotFound => ATT_ERR_UNLIKELY,
            AttError::ResourceExhausted => ATT_ERR_INSUFFICIENT_RESOURCES,
            AttError::SensorUnavailable => ATT_ERR_UNLIKELY,
        }
    }
}

/// Identity strings served by the Device Information service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub manufacturer_name: &'static str,
    pub model_number: &'static str,
    pub serial_number: &'static str,
    pub firmware_revision: &'static str,
    pub hardware_revision: &'static str,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            manufacturer_name: identity::MANUFACTURER_NAME,
            model_number: identity::MODEL_NUMBER,
            serial_number: identity::SERIAL_NUMBER,
            firmware_revision: identity::FIRMWARE_REVISION,
            hardware_revision: identity::HARDWARE_REVISION,
        }
    }
}

/// Everything a read function may look at
pub struct ReadContext<'a> {
    pub identity: &'a DeviceIdentity,
    pub battery_level: u8,
    pub source: &'a mut dyn MeasurementSource,
}

type ReadFn = fn(&mut ReadContext<'_>) -> Result<AttValue, AttError>;

struct ReadRoute {
    service: ServiceUuid,
    characteristic: CharacteristicUuid,
    read: ReadFn,
}

static ROUTES: &[ReadRoute] = &[
    ReadRoute {
        service: uuids::DEVICE_INFORMATION,
        characteristic: uuids::MANUFACTURER_NAME,
        read: |ctx| bytes(ctx.identity.manufacturer_name.as_bytes()),
    },
    ReadRoute {
        service: uuids::DEVICE_INFORMATION,
        characteristic: uuids::MODEL_NUMBER,
        read: |ctx| bytes(ctx.identity.model_number.as_bytes()),
    },
    ReadRoute {
        service: uuids::DEVICE_INFORMATION,
        characteristic: uuids::SERIAL_NUMBER,
        read: |ctx| bytes(ctx.identity.serial_number.as_bytes()),
    },
    ReadRoute {
        service: uuids::DEVICE_INFORMATION,
        characteristic: uuids::FIRMWARE_REVISION,
        read: |ctx| bytes(ctx.identity.firmware_revision.as_bytes()),
    },
    ReadRoute {
        service: uuids::DEVICE_INFORMATION,
        characteristic: uuids::HARDWARE_REVISION,
        read: |ctx| bytes(ctx.identity.hardware_revision.as_bytes()),
    },
    ReadRoute {
        service: uuids::BATTERY,
        characteristic: uuids::BATTERY_LEVEL,
        read: |ctx| bytes(&[ctx.battery_level]),
    },
    ReadRoute {
        service: uuids::ENVIRONMENTAL_SENSING,
        characteristic: uuids::TEMPERATURE,
        read: read_temperature,
    },
];

fn bytes(data: &[u8]) -> Result<AttValue, AttError> {
    Vec::from_slice(data).map_err(|_| AttError::ResourceExhausted)
}

fn read_temperature(ctx: &mut ReadContext<'_>) -> Result<AttValue, AttError> {
    let reading = ctx.source.read().map_err(|_| AttError::SensorUnavailable)?;
    let payload =
        TemperaturePayload::from_reading(reading).map_err(|_| AttError::SensorUnavailable)?;
    bytes(&payload.to_le_bytes())
}

/// Stateless read dispatcher
#[derive(Debug, Clone)]
pub struct AttributeRouter {
    identity: DeviceIdentity,
    battery_level: u8,
}

impl AttributeRouter {
    pub fn new(identity: DeviceIdentity, battery_level: u8) -> Self {
        Self {
            identity,
            battery_level,
        }
    }

    /// Produce the value of a characteristic
    pub fn read(
        &self,
        service: ServiceUuid,
        characteristic: CharacteristicUuid,
        source: &mut dyn MeasurementSource,
    ) -> Result<AttValue, AttError> {
        let route = ROUTES
            .iter()
            .find(|r| r.service == service && r.characteristic == characteristic)
            .ok_or(AttError::AttributeNotFound)?;

        log::debug!(
            "Read service 0x{:04X} characteristic 0x{:04X}",
            service.0,
            characteristic.0
        );

        let mut ctx = ReadContext {
            identity: &self.identity,
            battery_level: self.battery_level,
            source,
        };
        (route.read)(&mut ctx)
    }
}

impl Default for AttributeRouter {
    fn default() -> Self {
        Self::new(DeviceIdentity::default(), battery::LEVEL_PERCENT)
    }
}
