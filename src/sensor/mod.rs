//! Temperature measurement
//!
//! The source trait and the payload codec are host-testable. The hardware
//! source is only built for the embedded target.

pub mod payload;
pub mod traits;

#[cfg(feature = "embedded")]
pub mod rng;

pub use payload::TemperaturePayload;
pub use traits::{MeasurementSource, SensorError};
