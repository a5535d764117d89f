//! Measurement source backed by the hardware random number generator
//!
//! The board carries no temperature sensor; readings are a random byte
//! scaled down to a plausible room temperature. Readings are whole degrees,
//! so the tenth-of-a-degree resolution a raw byte could carry is dropped.

use esp_hal::rng::Rng;

use crate::sensor::traits::{MeasurementSource, SensorError};

/// Divisor mapping a random byte onto 0..=25 degrees
const BYTE_DIVISOR: u8 = 10;

/// Random temperature in whole degrees Celsius
pub struct RngTemperature {
    rng: Rng,
}

impl RngTemperature {
    pub fn new(rng: Rng) -> Self {
        Self { rng }
    }
}

impl MeasurementSource for RngTemperature {
    fn read(&mut self) -> Result<i16, SensorError> {
        let byte = self.rng.random().to_le_bytes()[0];
        Ok(i16::from(byte / BYTE_DIVISOR))
    }
}
