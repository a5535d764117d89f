//! Build-time configuration constants for the ESP32-S3 sensor node

/// Heartbeat LED
pub mod led {
    /// Time between two toggles of the heartbeat LED
    pub const BLINK_INTERVAL_MS: u64 = 500;
}

/// Periodic temperature notifications
pub mod scheduler {
    /// Milliseconds between two temperature notifications
    pub const UPDATE_INTERVAL_MS: u32 = 250;
}

/// Strings served by the Device Information service
pub mod identity {
    pub const MANUFACTURER_NAME: &str = "Alvarado Inc.";
    pub const MODEL_NUMBER: &str = "A4";
    pub const SERIAL_NUMBER: &str = "15263748-9876-x4";
    pub const FIRMWARE_REVISION: &str = "0.0.1";
    pub const HARDWARE_REVISION: &str = "1.6";
}

/// Battery service
pub mod battery {
    /// This battery never drains
    pub const LEVEL_PERCENT: u8 = 42;
}

/// Advertising parameters, reused unchanged every time the node re-advertises
pub mod advertising {
    /// GAP device name, also carried in the advertising payload
    pub const DEVICE_NAME: &str = "SensorNode";
    pub const INTERVAL_MS: u16 = 100;
}

/// GATT server sizing
pub mod gatt {
    /// First attribute handle available to application services
    pub const FIRST_HANDLE: u16 = 0x0001;

    /// Upper bound on characteristics in the attribute table
    pub const MAX_CHARACTERISTICS: usize = 8;

    /// Largest attribute value produced by a read
    pub const MAX_VALUE_LEN: usize = 32;

    /// Number of simultaneous connections accepted by the host
    pub const CONNECTIONS_MAX: usize = 1;

    /// Number of L2CAP channels (signal + att)
    pub const L2CAP_CHANNELS_MAX: usize = 2;
}

/// Measurement source
pub mod sensor {
    /// Worst-case blocking time of a single measurement
    pub const LATENCY_BOUND_MS: u32 = 50;

    /// Readings are transmitted in hundredths of a degree
    pub const SCALE: i16 = 100;
}

/// Serial console shell
pub mod shell {
    /// Longest accepted input line, excluding the terminator
    pub const MAX_LINE_LEN: usize = 128;

    /// Maximum number of whitespace separated tokens on a line
    pub const MAX_ARGS: usize = 8;

    /// Output buffer for a single command
    pub const MAX_OUTPUT_LEN: usize = 512;

    pub const PROMPT: &str = "> ";
}

/// Firmware version reported by the shell
pub mod firmware {
    pub const VERSION_MAJOR: u8 = 0;
    pub const VERSION_MINOR: u8 = 1;
    pub const VERSION_PATCH: u8 = 0;
}
