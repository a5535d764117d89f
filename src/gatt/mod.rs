//! GATT attribute tree
//!
//! Provides the static service table, handle registration and the read
//! router that answers attribute reads from the radio stack.

pub mod router;
pub mod table;
pub mod uuids;

pub use router::{AttError, AttValue, AttributeRouter, DeviceIdentity};
pub use table::{Properties, Registry, RegistrationError, ValueHandle, SERVICES};
pub use uuids::{CharacteristicUuid, ServiceUuid};
