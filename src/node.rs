//! Sensor node context
//!
//! [`SensorNode`] owns all core state: the single connection, the update
//! scheduler, the registered attribute table and the measurement source.
//! The BLE task feeds it events from one cooperative loop, so nothing in here
//! needs locking.
//!
//! Invariant: the scheduler is armed exactly while a client is connected and
//! subscribed to the temperature characteristic.

use crate::config::{battery, gatt::FIRST_HANDLE, scheduler::UPDATE_INTERVAL_MS};
use crate::gatt::router::{AttError, AttValue, AttributeRouter, DeviceIdentity};
use crate::gatt::table::{Registry, RegistrationError, ServiceDef, ValueHandle, SERVICES};
use crate::gatt::uuids::{CharacteristicUuid, ServiceUuid};
use crate::link::advertising::{Advertiser, AdvertisingConfig};
use crate::link::events::{ConnectionId, LinkEvent};
use crate::link::state::{ConnectionStateMachine, Effect, LinkPhase};
use crate::notify::notifier::{Notifier, NotifyError};
use crate::notify::scheduler::UpdateScheduler;
use crate::sensor::payload::TemperaturePayload;
use crate::sensor::traits::{MeasurementSource, SensorError};

/// Runtime configuration of the node
#[derive(Debug, Clone, Copy)]
pub struct NodeConfig {
    pub update_interval_ms: u32,
    pub identity: DeviceIdentity,
    pub battery_level: u8,
    pub advertising: AdvertisingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: UPDATE_INTERVAL_MS,
            identity: DeviceIdentity::default(),
            battery_level: battery::LEVEL_PERCENT,
            advertising: AdvertisingConfig::default(),
        }
    }
}

/// Events consumed by the node's dispatch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEvent {
    Link(LinkEvent),
    /// The update timer fired
    UpdateDue,
}

/// Why a due update did not produce a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Sensor(SensorError),
    Notify(NotifyError),
}

/// Result of polling the update scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No firing pending at this time
    NotDue,
    /// Notification delivered
    Sent(TemperaturePayload),
    /// Tick skipped, scheduler stays armed
    Skipped(SkipReason),
    /// Firing found no subscribed connection and was dropped
    Cancelled,
}

/// Notification counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    pub sent: u32,
    pub skipped: u32,
}

/// Process-owned context holding all core state
pub struct SensorNode<M> {
    link: ConnectionStateMachine,
    scheduler: UpdateScheduler,
    router: AttributeRouter,
    registry: Registry,
    advertising: AdvertisingConfig,
    source: M,
    stats: UpdateStats,
}

impl<M: MeasurementSource> SensorNode<M> {
    /// Register the default attribute table and build the node.
    pub fn new(config: NodeConfig, source: M) -> Result<Self, RegistrationError> {
        Self::with_services(config, SERVICES, source)
    }

    /// Build the node around a custom attribute table.
    ///
    /// Fails when the table is rejected; that is a build-time defect and the
    /// caller should abort startup.
    pub fn with_services(
        config: NodeConfig,
        services: &[ServiceDef],
        source: M,
    ) -> Result<Self, RegistrationError> {
        let registry = Registry::register(services, FIRST_HANDLE)?;

        Ok(Self {
            link: ConnectionStateMachine::new(),
            scheduler: UpdateScheduler::new(config.update_interval_ms),
            router: AttributeRouter::new(config.identity, config.battery_level),
            registry,
            advertising: config.advertising,
            source,
            stats: UpdateStats::default(),
        })
    }

    /// Start advertising for the first time
    pub fn boot<A: Advertiser>(&mut self, advertiser: &mut A) {
        log::info!("Node: advertising as '{}'", self.advertising.device_name);
        advertiser.start(&self.advertising);
    }

    /// Apply a lifecycle event and its side effects.
    pub fn handle_link_event<A: Advertiser>(
        &mut self,
        event: LinkEvent,
        now: u64,
        advertiser: &mut A,
    ) {
        let effects = self.link.handle(event, self.registry.notify_handle());

        for effect in effects {
            match effect {
                Effect::ArmUpdates => self.scheduler.arm(now),
                Effect::DisarmUpdates => self.scheduler.disarm(),
                Effect::StartAdvertising => advertiser.start(&self.advertising),
            }
        }

        debug_assert_eq!(self.scheduler.is_armed(), self.link.is_subscribed());
    }

    /// Run the update action if the scheduler is due at `now`.
    pub async fn poll_updates<N: Notifier>(&mut self, now: u64, notifier: &mut N) -> UpdateOutcome {
        if !self.scheduler.is_due(now) {
            return UpdateOutcome::NotDue;
        }

        // The firing may have been queued before the link changed
        let target = match (self.link.connection_id(), self.registry.notify_handle()) {
            (Some(conn), Some(handle)) if self.link.is_subscribed() => (conn, handle),
            _ => {
                log::warn!("Update: stale firing dropped");
                self.scheduler.disarm();
                return UpdateOutcome::Cancelled;
            }
        };

        let outcome = self.send_update(target, notifier).await;
        self.scheduler.complete_firing(now);
        outcome
    }

    async fn send_update<N: Notifier>(
        &mut self,
        (conn, handle): (ConnectionId, ValueHandle),
        notifier: &mut N,
    ) -> UpdateOutcome {
        let payload = match self
            .source
            .read()
            .and_then(TemperaturePayload::from_reading)
        {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("Update: measurement failed ({:?}), tick skipped", e);
                self.stats.skipped += 1;
                return UpdateOutcome::Skipped(SkipReason::Sensor(e));
            }
        };

        match notifier.send(conn, handle, &payload.to_le_bytes()).await {
            Ok(()) => {
                log::debug!("Update: notified {}", payload.hundredths());
                self.stats.sent += 1;
                UpdateOutcome::Sent(payload)
            }
            Err(e) => {
                log::warn!("Update: notify failed ({:?}), tick skipped", e);
                self.stats.skipped += 1;
                UpdateOutcome::Skipped(SkipReason::Notify(e))
            }
        }
    }

    /// Single dispatch point for the event loop
    pub async fn dispatch<A: Advertiser, N: Notifier>(
        &mut self,
        event: NodeEvent,
        now: u64,
        advertiser: &mut A,
        notifier: &mut N,
    ) {
        match event {
            NodeEvent::Link(link_event) => self.handle_link_event(link_event, now, advertiser),
            NodeEvent::UpdateDue => {
                self.poll_updates(now, notifier).await;
            }
        }
    }

    /// Answer an attribute read.
    ///
    /// Independent of subscription state.
    pub fn read(
        &mut self,
        service: ServiceUuid,
        characteristic: CharacteristicUuid,
    ) -> Result<AttValue, AttError> {
        match self.registry.find(service, characteristic) {
            Some(c) if c.properties.readable() => {}
            _ => return Err(AttError::AttributeNotFound),
        }
        self.router.read(service, characteristic, &mut self.source)
    }

    pub fn phase(&self) -> LinkPhase {
        self.link.phase()
    }

    pub fn connection_id(&self) -> Option<ConnectionId> {
        self.link.connection_id()
    }

    pub fn is_update_armed(&self) -> bool {
        self.scheduler.is_armed()
    }

    /// When the event loop must next call [`Self::poll_updates`]
    pub fn next_update_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    /// Value handle addressed by notifications
    pub fn notify_handle(&self) -> Option<ValueHandle> {
        self.registry.notify_handle()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn advertising_config(&self) -> &AdvertisingConfig {
        &self.advertising
    }

    pub fn stats(&self) -> UpdateStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::table::{CharacteristicDef, Properties};
    use crate::gatt::uuids;
    use crate::link::advertising::mock::MockAdvertiser;
    use crate::notify::notifier::mock::MockNotifier;
    use crate::sensor::traits::mock::MockMeasurementSource;
    use futures::executor::block_on;

    const CONN: ConnectionId = ConnectionId(1);
    const INTERVAL: u64 = 250;

    struct Harness {
        node: SensorNode<MockMeasurementSource>,
        advertiser: MockAdvertiser,
        notifier: MockNotifier,
    }

    impl Harness {
        fn new(source: MockMeasurementSource) -> Self {
            let mut advertiser = MockAdvertiser::new();
            let mut node = SensorNode::new(NodeConfig::default(), source).unwrap();
            node.boot(&mut advertiser);
            Self {
                node,
                advertiser,
                notifier: MockNotifier::new(),
            }
        }

        fn link(&mut self, event: LinkEvent, now: u64) {
            block_on(self.node.dispatch(
                NodeEvent::Link(event),
                now,
                &mut self.advertiser,
                &mut self.notifier,
            ));
        }

        fn tick(&mut self, now: u64) {
            block_on(self.node.dispatch(
                NodeEvent::UpdateDue,
                now,
                &mut self.advertiser,
                &mut self.notifier,
            ));
        }

        fn poll(&mut self, now: u64) -> UpdateOutcome {
            block_on(self.node.poll_updates(now, &mut self.notifier))
        }

        fn subscribe(&mut self, enable: bool, now: u64) {
            let handle = self.node.notify_handle().unwrap();
            self.link(
                LinkEvent::Subscribe {
                    conn: CONN,
                    handle,
                    enable,
                },
                now,
            );
        }

        fn armed_matches_subscription(&self) -> bool {
            self.node.is_update_armed() == (self.node.phase() == LinkPhase::ConnectedSubscribed)
        }
    }

    #[test]
    fn test_boot_advertises_once() {
        let h = Harness::new(MockMeasurementSource::new(20));
        assert_eq!(h.advertiser.start_count(), 1);
        assert_eq!(h.advertiser.last_config(), Some(AdvertisingConfig::default()));
        assert_eq!(h.node.phase(), LinkPhase::Idle);
        assert!(!h.node.is_update_armed());
    }

    #[test]
    fn test_three_intervals_three_sends() {
        let source = MockMeasurementSource::new(0);
        source.queue_readings(&[20, 21, -3]);
        let mut h = Harness::new(source);

        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);

        for i in 1..=3 {
            h.tick(i * INTERVAL);
        }

        let sent = h.notifier.get_sent();
        assert_eq!(sent.len(), 3);
        let expected: [i16; 3] = [2000, 2100, -300];
        for (notification, value) in sent.iter().zip(expected) {
            assert_eq!(notification.conn, CONN);
            assert_eq!(Some(notification.handle), h.node.notify_handle());
            assert_eq!(notification.payload.as_slice(), &value.to_le_bytes());
        }
        assert_eq!(h.node.stats(), UpdateStats { sent: 3, skipped: 0 });
    }

    #[test]
    fn test_unsubscribe_stops_sends() {
        let mut h = Harness::new(MockMeasurementSource::new(20));

        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);
        h.subscribe(false, 10);
        h.tick(INTERVAL);
        h.tick(2 * INTERVAL);

        assert_eq!(h.notifier.attempt_count(), 0);
        assert!(!h.node.is_update_armed());
    }

    #[test]
    fn test_disconnect_disarms_and_readvertises() {
        let mut h = Harness::new(MockMeasurementSource::new(20));

        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);
        assert!(h.node.is_update_armed());

        h.link(LinkEvent::Disconnect(CONN), 100);

        assert_eq!(h.node.phase(), LinkPhase::Idle);
        assert!(!h.node.is_update_armed());
        assert_eq!(h.node.next_update_deadline(), None);
        assert_eq!(h.advertiser.start_count(), 2);
        assert_eq!(h.advertiser.last_config(), Some(AdvertisingConfig::default()));
    }

    #[test]
    fn test_firing_queued_before_disconnect_is_noop() {
        let mut h = Harness::new(MockMeasurementSource::new(20));

        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);
        // Timer expired, but the disconnect is processed first
        h.link(LinkEvent::Disconnect(CONN), INTERVAL);
        h.tick(INTERVAL);

        assert_eq!(h.notifier.attempt_count(), 0);
        assert_eq!(h.node.stats(), UpdateStats::default());
    }

    #[test]
    fn test_connect_failed_readvertises() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        h.link(LinkEvent::ConnectFailed, 0);
        assert_eq!(h.advertiser.start_count(), 2);
        assert_eq!(h.node.phase(), LinkPhase::Idle);
    }

    #[test]
    fn test_invariant_holds_across_event_sequence() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        let handle = h.node.notify_handle().unwrap();

        let events = [
            LinkEvent::ConnectFailed,
            LinkEvent::ConnectSucceeded(CONN),
            LinkEvent::Subscribe { conn: CONN, handle, enable: true },
            LinkEvent::Subscribe { conn: CONN, handle: ValueHandle(2), enable: false },
            LinkEvent::Subscribe { conn: CONN, handle, enable: true },
            LinkEvent::Subscribe { conn: CONN, handle, enable: false },
            LinkEvent::Subscribe { conn: CONN, handle, enable: true },
            LinkEvent::Disconnect(ConnectionId(9)),
            LinkEvent::Disconnect(CONN),
            LinkEvent::Subscribe { conn: CONN, handle, enable: true },
            LinkEvent::ConnectSucceeded(ConnectionId(2)),
        ];

        for (i, event) in events.into_iter().enumerate() {
            h.link(event, i as u64 * 10);
            assert!(h.armed_matches_subscription(), "after {:?}", event);
        }
    }

    #[test]
    fn test_resubscribe_replaces_deadline() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);
        h.subscribe(true, 100);
        assert_eq!(h.node.next_update_deadline(), Some(100 + INTERVAL));
    }

    #[test]
    fn test_notify_failure_skips_tick_and_stays_armed() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);

        h.notifier.set_next_error(NotifyError::ResourceExhausted);
        assert_eq!(
            h.poll(INTERVAL),
            UpdateOutcome::Skipped(SkipReason::Notify(NotifyError::ResourceExhausted))
        );
        assert!(h.node.is_update_armed());
        assert_eq!(h.node.next_update_deadline(), Some(2 * INTERVAL));

        assert!(matches!(h.poll(2 * INTERVAL), UpdateOutcome::Sent(_)));
        assert_eq!(h.node.stats(), UpdateStats { sent: 1, skipped: 1 });
    }

    #[test]
    fn test_sensor_failure_skips_tick() {
        let source = MockMeasurementSource::new(20);
        source.set_next_error(SensorError::Timeout);
        let mut h = Harness::new(source);
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);

        assert_eq!(
            h.poll(INTERVAL),
            UpdateOutcome::Skipped(SkipReason::Sensor(SensorError::Timeout))
        );
        assert_eq!(h.notifier.attempt_count(), 0);
        assert!(h.node.is_update_armed());
    }

    #[test]
    fn test_out_of_range_reading_skips_tick() {
        let mut h = Harness::new(MockMeasurementSource::new(1000));
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);

        assert_eq!(
            h.poll(INTERVAL),
            UpdateOutcome::Skipped(SkipReason::Sensor(SensorError::OutOfRange))
        );
    }

    #[test]
    fn test_poll_before_deadline_not_due() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);
        assert_eq!(h.poll(INTERVAL - 1), UpdateOutcome::NotDue);
        assert_eq!(h.notifier.attempt_count(), 0);
    }

    #[test]
    fn test_liveness_with_jitter() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);
        h.subscribe(true, 0);

        let jitter = [0u64, 3, 17, 1, 9, 0, 24, 2];
        let mut last_fire = 0;
        for round in 0..100 {
            let deadline = h.node.next_update_deadline().unwrap();
            let now = deadline + jitter[round % jitter.len()];
            assert!(matches!(h.poll(now), UpdateOutcome::Sent(_)));

            let gap = now - last_fire;
            assert!((INTERVAL..=INTERVAL + 24).contains(&gap), "gap {}", gap);
            last_fire = now;
        }
        assert_eq!(h.notifier.attempt_count(), 100);
        assert_eq!(h.node.stats(), UpdateStats { sent: 100, skipped: 0 });
    }

    #[test]
    fn test_custom_interval() {
        let config = NodeConfig {
            update_interval_ms: 1000,
            ..NodeConfig::default()
        };
        let mut node = SensorNode::new(config, MockMeasurementSource::new(20)).unwrap();
        let mut advertiser = MockAdvertiser::new();
        let handle = node.notify_handle().unwrap();

        node.handle_link_event(LinkEvent::ConnectSucceeded(CONN), 0, &mut advertiser);
        node.handle_link_event(
            LinkEvent::Subscribe { conn: CONN, handle, enable: true },
            5,
            &mut advertiser,
        );
        assert_eq!(node.next_update_deadline(), Some(1005));
    }

    #[test]
    fn test_battery_read_independent_of_subscription() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);

        let unsubscribed = h.node.read(uuids::BATTERY, uuids::BATTERY_LEVEL).unwrap();
        h.subscribe(true, 0);
        let subscribed = h.node.read(uuids::BATTERY, uuids::BATTERY_LEVEL).unwrap();

        assert_eq!(unsubscribed.as_slice(), &[42]);
        assert_eq!(subscribed, unsubscribed);
    }

    #[test]
    fn test_device_info_read_independent_of_subscription() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);

        let before = h.node.read(uuids::DEVICE_INFORMATION, uuids::MODEL_NUMBER).unwrap();
        h.subscribe(true, 0);
        let after = h.node.read(uuids::DEVICE_INFORMATION, uuids::MODEL_NUMBER).unwrap();

        assert_eq!(before.as_slice(), b"A4");
        assert_eq!(before, after);
    }

    #[test]
    fn test_temperature_read_does_not_touch_scheduler() {
        let mut h = Harness::new(MockMeasurementSource::new(23));
        h.link(LinkEvent::ConnectSucceeded(CONN), 0);

        let value = h
            .node
            .read(uuids::ENVIRONMENTAL_SENSING, uuids::TEMPERATURE)
            .unwrap();
        assert_eq!(value.as_slice(), &[0xFC, 0x08]);
        assert!(!h.node.is_update_armed());
    }

    #[test]
    fn test_read_unregistered_characteristic() {
        let mut h = Harness::new(MockMeasurementSource::new(20));
        let result = h.node.read(uuids::BATTERY, uuids::TEMPERATURE);
        assert_eq!(result, Err(AttError::AttributeNotFound));
    }

    #[test]
    fn test_misconfigured_table_rejected() {
        let services = [ServiceDef {
            uuid: uuids::BATTERY,
            characteristics: &[CharacteristicDef {
                uuid: uuids::BATTERY_LEVEL,
                properties: Properties::NONE,
            }],
        }];
        let result = SensorNode::with_services(
            NodeConfig::default(),
            &services,
            MockMeasurementSource::new(20),
        );
        assert!(matches!(result, Err(RegistrationError::NoCapabilities(_))));
    }

    #[test]
    fn test_table_without_notifiable_never_arms() {
        static SERVICES_NO_NOTIFY: &[ServiceDef] = &[ServiceDef {
            uuid: uuids::BATTERY,
            characteristics: &[CharacteristicDef {
                uuid: uuids::BATTERY_LEVEL,
                properties: Properties::READ,
            }],
        }];
        let mut node = SensorNode::with_services(
            NodeConfig::default(),
            SERVICES_NO_NOTIFY,
            MockMeasurementSource::new(20),
        )
        .unwrap();
        let mut advertiser = MockAdvertiser::new();

        node.handle_link_event(LinkEvent::ConnectSucceeded(CONN), 0, &mut advertiser);
        node.handle_link_event(
            LinkEvent::Subscribe { conn: CONN, handle: ValueHandle(4), enable: true },
            0,
            &mut advertiser,
        );
        assert_eq!(node.notify_handle(), None);
        assert!(!node.is_update_armed());
    }
}
