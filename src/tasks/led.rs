//! Heartbeat LED task
//!
//! Toggles the on-board LED forever so a running board is visible at a
//! glance. Independent of the BLE node.

use embassy_time::{Duration, Timer};
use embedded_hal::digital::StatefulOutputPin;

use crate::config::led::BLINK_INTERVAL_MS;

/// Task body that blinks `led` every [`BLINK_INTERVAL_MS`]
pub async fn led_task<P: StatefulOutputPin>(mut led: P) {
    loop {
        if led.toggle().is_err() {
            log::warn!("LED: toggle failed");
        }
        Timer::after(Duration::from_millis(BLINK_INTERVAL_MS)).await;
    }
}
