//! Periodic temperature notifications
//!
//! The scheduler decides when an update is due; the notifier delivers it.

pub mod notifier;
pub mod scheduler;

pub use notifier::{Notifier, NotifyError};
pub use scheduler::UpdateScheduler;
