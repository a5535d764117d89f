//! Connection state machine
//!
//! Tracks the single live connection and its subscription flag. The machine
//! never touches the scheduler or the radio itself; every transition returns
//! the [`Effects`] the owner must apply.

use crate::gatt::table::ValueHandle;
use crate::link::events::{ConnectionId, LinkEvent};
use heapless::Vec;

/// Externally visible state of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Idle,
    ConnectedUnsubscribed,
    ConnectedSubscribed,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Start (or restart) periodic updates
    ArmUpdates,
    /// Cancel periodic updates
    DisarmUpdates,
    /// Re-enter advertising with the boot configuration
    StartAdvertising,
}

/// Effects of a single transition, in the order they must be applied
pub type Effects = Vec<Effect, 2>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Connection {
    id: ConnectionId,
    subscribed: bool,
}

/// Owner of the single Connection
#[derive(Debug, Default)]
pub struct ConnectionStateMachine {
    connection: Option<Connection>,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        Self { connection: None }
    }

    pub fn phase(&self) -> LinkPhase {
        match self.connection {
            None => LinkPhase::Idle,
            Some(Connection { subscribed: false, .. }) => LinkPhase::ConnectedUnsubscribed,
            Some(Connection { subscribed: true, .. }) => LinkPhase::ConnectedSubscribed,
        }
    }

    /// Identifier of the live connection
    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.connection.map(|c| c.id)
    }

    /// True while a client is connected and subscribed
    pub fn is_subscribed(&self) -> bool {
        matches!(self.connection, Some(Connection { subscribed: true, .. }))
    }

    /// Apply a lifecycle event.
    ///
    /// `notify_handle` is the value handle of the notifiable characteristic;
    /// subscriptions to any other handle are ignored.
    pub fn handle(&mut self, event: LinkEvent, notify_handle: Option<ValueHandle>) -> Effects {
        let mut effects = Effects::new();

        match (self.connection, event) {
            (None, LinkEvent::ConnectSucceeded(id)) => {
                log::info!("Link: connected (conn {})", id.0);
                self.connection = Some(Connection { id, subscribed: false });
            }
            (None, LinkEvent::ConnectFailed) => {
                log::info!("Link: connect failed, advertising again");
                push(&mut effects, Effect::StartAdvertising);
            }
            (Some(live), LinkEvent::Disconnect(id)) if live.id == id => {
                log::info!("Link: disconnected (conn {})", id.0);
                self.connection = None;
                push(&mut effects, Effect::DisarmUpdates);
                push(&mut effects, Effect::StartAdvertising);
            }
            (Some(live), LinkEvent::Subscribe { conn, handle, enable }) if live.id == conn => {
                if notify_handle != Some(handle) {
                    log::warn!("Link: subscribe to unknown handle {} ignored", handle.0);
                    return effects;
                }
                self.connection = Some(Connection { id: live.id, subscribed: enable });
                if enable {
                    log::info!("Link: subscribed");
                    push(&mut effects, Effect::ArmUpdates);
                } else {
                    log::info!("Link: unsubscribed");
                    push(&mut effects, Effect::DisarmUpdates);
                }
            }
            (state, event) => {
                log::warn!("Link: {:?} ignored in state {:?}", event, state.map(|c| c.id));
            }
        }

        effects
    }
}

fn push(effects: &mut Effects, effect: Effect) {
    // capacity covers the longest transition
    let _ = effects.push(effect);
}
