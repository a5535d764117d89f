//! Temperature value encoding
//!
//! Both the Temperature characteristic value and its notifications carry a
//! signed 16-bit little-endian integer in hundredths of a degree Celsius.

use crate::config::sensor::SCALE;
use crate::sensor::traits::SensorError;

/// Lowest reading that still fits the payload after scaling
pub const MIN_READING: i16 = i16::MIN / SCALE;
/// Highest reading that still fits the payload after scaling
pub const MAX_READING: i16 = i16::MAX / SCALE;

/// Encoded temperature, built fresh from every measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperaturePayload {
    hundredths: i16,
}

impl TemperaturePayload {
    /// Size of the encoded value in bytes
    pub const LEN: usize = 2;

    /// Scale a whole-degree reading into the payload
    pub fn from_reading(reading: i16) -> Result<Self, SensorError> {
        reading
            .checked_mul(SCALE)
            .map(|hundredths| Self { hundredths })
            .ok_or(SensorError::OutOfRange)
    }

    pub fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self {
            hundredths: i16::from_le_bytes(bytes),
        }
    }

    /// Decode an encoded value, `None` unless exactly [`Self::LEN`] bytes
    pub fn from_le_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::LEN {
            return None;
        }
        Some(Self::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn to_le_bytes(self) -> [u8; 2] {
        self.hundredths.to_le_bytes()
    }

    /// Raw value in hundredths of a degree
    pub fn hundredths(self) -> i16 {
        self.hundredths
    }

    /// Value in whole degrees (truncates towards zero)
    pub fn reading(self) -> i16 {
        self.hundredths / SCALE
    }
}
