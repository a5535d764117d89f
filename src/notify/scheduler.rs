//! Periodic update scheduler
//!
//! A single recurring timer entry driven by the cooperative event loop. Time
//! is passed in explicitly as milliseconds since boot, so the same code runs
//! against the embassy clock on target and a virtual clock in tests.
//!
//! Each firing re-arms relative to the moment it actually ran, not to the
//! deadline it was due at. Lateness therefore accumulates across firings.

use crate::config::scheduler::UPDATE_INTERVAL_MS;

/// Armed/disarmed timer with one pending deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateScheduler {
    interval_ms: u32,
    armed: bool,
    deadline: u64,
}

impl UpdateScheduler {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            armed: false,
            deadline: 0,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Schedule the first firing at `now + interval`.
    ///
    /// Replaces any pending firing.
    pub fn arm(&mut self, now: u64) {
        self.armed = true;
        self.deadline = now.saturating_add(u64::from(self.interval_ms));
    }

    /// Cancel the pending firing. No-op when already disarmed.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Deadline of the pending firing
    pub fn next_deadline(&self) -> Option<u64> {
        self.armed.then_some(self.deadline)
    }

    /// True when armed and the deadline has passed
    pub fn is_due(&self, now: u64) -> bool {
        self.armed && now >= self.deadline
    }

    /// Re-arm after a firing that ran at `now`.
    ///
    /// Does nothing if the update action disarmed the scheduler.
    pub fn complete_firing(&mut self, now: u64) {
        if self.armed {
            self.arm(now);
        }
    }
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new(UPDATE_INTERVAL_MS)
    }
}
