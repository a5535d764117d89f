//! Measurement source trait for abstraction and testability
//!
//! The hardware sensor is polled with a busy-wait on its data-ready flag.
//! That spin lives inside the implementation; callers only see a blocking
//! read bounded by [`LATENCY_BOUND_MS`].

pub use crate::config::sensor::LATENCY_BOUND_MS;

/// Errors that can occur while taking a measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Data-ready flag not raised within the latency bound
    Timeout,
    /// Reading cannot be represented in the transmitted format
    OutOfRange,
}

/// Source of temperature readings in whole degrees Celsius
pub trait MeasurementSource {
    /// Take one measurement.
    ///
    /// May block, but never longer than [`LATENCY_BOUND_MS`].
    fn read(&mut self) -> Result<i16, SensorError>;
}
