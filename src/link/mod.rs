//! Connection lifecycle and advertising
//!
//! The state machine in [`state`] is pure: it consumes [`LinkEvent`]s and
//! returns the side effects the caller must apply, which keeps it testable
//! without a radio.

pub mod advertising;
pub mod events;
pub mod state;

pub use advertising::{
    Advertiser, AdvertisingConfig, AdvertisingDuration, AdvertisingError, AdvertisingFlags,
    AdvertisingKind,
};
pub use events::{ConnectionId, LinkEvent};
pub use state::{ConnectionStateMachine, Effect, Effects, LinkPhase};
