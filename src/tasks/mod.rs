//! Embassy tasks module
//!
//! Contains all async tasks for the firmware, organised by functionality.

pub mod ble;
pub mod led;
pub mod shell;

pub use ble::ble_task;
pub use led::led_task;
pub use shell::shell_task;
