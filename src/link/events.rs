//! Link-layer events delivered to the connection state machine

use crate::gatt::table::ValueHandle;

/// Connection handle assigned by the BLE host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionId(pub u16);

/// Events reported by the BLE stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A central connected
    ConnectSucceeded(ConnectionId),
    /// A connection attempt failed before it was established
    ConnectFailed,
    /// The connection with the given id dropped
    Disconnect(ConnectionId),
    /// The client wrote the configuration descriptor of `handle`
    Subscribe {
        conn: ConnectionId,
        handle: ValueHandle,
        enable: bool,
    },
}
