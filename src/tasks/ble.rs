//! BLE task driving the sensor node
//!
//! Runs the trouble-host stack and the node's cooperative event loop side by
//! side. All node state is touched from the peripheral future only: link
//! events, attribute reads and update firings are handled one at a time in
//! arrival order.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant, Timer};
use trouble_host::prelude::*;

use crate::ble::service::{BatteryService, DeviceInformationService, EnvironmentalSensingService};
use crate::config::gatt::{CONNECTIONS_MAX, L2CAP_CHANNELS_MAX};
use crate::gatt::router::{AttError, AttValue};
use crate::gatt::table::ValueHandle;
use crate::gatt::uuids::{self, CharacteristicUuid, ServiceUuid};
use crate::link::advertising::{
    Advertiser, AdvertisingConfig, AdvertisingDuration, AdvertisingKind, MAX_PAYLOAD_LEN,
};
use crate::link::events::{ConnectionId, LinkEvent};
use crate::node::{NodeEvent, SensorNode};
use crate::notify::notifier::{Notifier, NotifyError};
use crate::sensor::payload::TemperaturePayload;
use crate::sensor::traits::MeasurementSource;

/// CCCD bit enabling notifications
const CCCD_NOTIFY: u8 = 0x01;

/// BLE GATT server with the sensor node services
#[gatt_server(mutex_type = CriticalSectionRawMutex)]
struct Server {
    device_info: DeviceInformationService,
    battery: BatteryService,
    environment: EnvironmentalSensingService,
}

/// Collects advertising requests made by the node.
///
/// The node asks for advertising from inside its handlers; the task loop
/// picks the request up once it is back at the top of the loop.
#[derive(Default)]
struct AdvertisingRequests {
    pending: Option<AdvertisingConfig>,
}

impl AdvertisingRequests {
    fn take(&mut self) -> Option<AdvertisingConfig> {
        self.pending.take()
    }
}

impl Advertiser for AdvertisingRequests {
    fn start(&mut self, config: &AdvertisingConfig) {
        // A second request before the first is served changes nothing
        self.pending = Some(*config);
    }
}

/// Delivers node notifications over one live connection
struct GattNotifier<'a, 'stack, 'server, 'values, P: PacketPool> {
    server: &'server Server<'values>,
    conn: &'a GattConnection<'stack, 'server, P>,
    id: ConnectionId,
    notify_handle: Option<ValueHandle>,
}

impl<P: PacketPool> Notifier for GattNotifier<'_, '_, '_, '_, P> {
    async fn send(
        &mut self,
        conn: ConnectionId,
        handle: ValueHandle,
        payload: &[u8],
    ) -> Result<(), NotifyError> {
        if conn != self.id || self.notify_handle != Some(handle) {
            return Err(NotifyError::InvalidHandle);
        }
        let value = TemperaturePayload::from_le_slice(payload).ok_or(NotifyError::InvalidPayload)?;

        self.server
            .environment
            .temperature
            .notify(self.conn, &value.hundredths())
            .await
            .map_err(|_| NotifyError::ResourceExhausted)
    }
}

/// Milliseconds since boot, the node's clock
fn now_ms() -> u64 {
    Instant::now().as_millis()
}

/// Main BLE task
///
/// 1. Builds the host stack and GATT server
/// 2. Boots the node, which requests advertising
/// 3. Advertises, accepts a connection and feeds its events to the node
/// 4. Fires periodic updates while the client is subscribed
pub async fn ble_task<C: Controller, M: MeasurementSource>(
    controller: C,
    mut node: SensorNode<M>,
    address: [u8; 6],
) {
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();

    let stack = trouble_host::new(controller, &mut resources).set_random_address(Address::random(address));

    let Host {
        mut peripheral,
        mut runner,
        ..
    } = stack.build();

    let device_name = node.advertising_config().device_name;
    let gap = GapConfig::Peripheral(PeripheralConfig {
        name: device_name,
        appearance: &appearance::UNKNOWN,
    });
    let server: Server = match Server::new_with_config(gap) {
        Ok(s) => s,
        Err(e) => {
            log::error!("BLE: GATT server rejected: {:?}", e);
            return;
        }
    };

    let runner_task = runner.run();

    let peripheral_task = async {
        let mut requests = AdvertisingRequests::default();
        node.boot(&mut requests);

        loop {
            let config = requests.take().unwrap_or(*node.advertising_config());

            let kind = match config.flags.kind() {
                Ok(kind) => kind,
                Err(e) => {
                    log::error!("BLE: cannot advertise with {:?}: {:?}", config.flags, e);
                    return;
                }
            };

            let mut adv_data = [0u8; MAX_PAYLOAD_LEN];
            let len = match config.encode_payload(&mut adv_data) {
                Ok(len) => len,
                Err(e) => {
                    log::error!("BLE: advertising data rejected: {:?}", e);
                    return;
                }
            };

            let interval = Duration::from_millis(u64::from(config.interval_ms));
            let params = AdvertisementParameters {
                interval_min: interval,
                interval_max: interval,
                timeout: match config.duration {
                    AdvertisingDuration::Forever => None,
                    AdvertisingDuration::Limited(ms) => Some(Duration::from_millis(u64::from(ms))),
                },
                ..Default::default()
            };

            let adv_data = &adv_data[..len];
            let advertisement = match kind {
                AdvertisingKind::ConnectableScannable => Advertisement::ConnectableScannableUndirected {
                    adv_data,
                    scan_data: &[],
                },
                AdvertisingKind::NonconnectableScannable => Advertisement::NonconnectableScannableUndirected {
                    adv_data,
                    scan_data: &[],
                },
                AdvertisingKind::NonconnectableNonscannable => {
                    Advertisement::NonconnectableNonscannableUndirected { adv_data }
                }
            };

            log::info!("BLE: advertising ({:?})...", kind);
            let advertiser = match peripheral.advertise(&params, advertisement).await {
                Ok(a) => a,
                Err(e) => {
                    log::warn!("BLE: advertising failed: {:?}", e);
                    node.handle_link_event(LinkEvent::ConnectFailed, now_ms(), &mut requests);
                    continue;
                }
            };

            let conn = match advertiser
                .accept()
                .await
                .and_then(|acceptor| acceptor.with_attribute_server(&*server))
            {
                Ok(c) => c,
                Err(e) => {
                    log::warn!("BLE: connection not established: {:?}", e);
                    node.handle_link_event(LinkEvent::ConnectFailed, now_ms(), &mut requests);
                    continue;
                }
            };

            let id = ConnectionId(conn.raw().handle().raw());
            node.handle_link_event(LinkEvent::ConnectSucceeded(id), now_ms(), &mut requests);

            let mut notifier = GattNotifier {
                server: &server,
                conn: &conn,
                id,
                notify_handle: node.notify_handle(),
            };

            loop {
                let deadline = node.next_update_deadline();
                let update_timer = async {
                    match deadline {
                        Some(ms) => Timer::at(Instant::from_millis(ms)).await,
                        None => core::future::pending::<()>().await,
                    }
                };

                let event = match select(conn.next(), update_timer).await {
                    Either::First(GattConnectionEvent::Disconnected { reason }) => {
                        log::info!("BLE: disconnected: {:?}", reason);
                        Some(NodeEvent::Link(LinkEvent::Disconnect(id)))
                    }
                    Either::First(GattConnectionEvent::Gatt { event }) => {
                        handle_gatt_event(&mut node, &server, id, event)
                    }
                    Either::First(_) => None,
                    Either::Second(()) => Some(NodeEvent::UpdateDue),
                };

                if let Some(event) = event {
                    node.dispatch(event, now_ms(), &mut requests, &mut notifier).await;
                }

                if node.connection_id() != Some(id) {
                    break;
                }
            }

            let stats = node.stats();
            log::info!("BLE: session ended ({} sent, {} skipped)", stats.sent, stats.skipped);
        }
    };

    select(runner_task, peripheral_task).await;
}

/// Translate a GATT event into a node event, answering reads on the spot
fn handle_gatt_event<M: MeasurementSource, P: PacketPool>(
    node: &mut SensorNode<M>,
    server: &Server<'_>,
    id: ConnectionId,
    event: GattEvent<'_, '_, P>,
) -> Option<NodeEvent> {
    match event {
        GattEvent::Read(read_event) => {
            if let Some((service, characteristic)) = characteristic_at(server, read_event.handle()) {
                match refresh_value(node, server, service, characteristic) {
                    Ok(()) => {
                        let _ = read_event.accept();
                    }
                    Err(e) => {
                        log::warn!("BLE: read of 0x{:04X} failed: {:?}", characteristic.0, e);
                        let _ = read_event.reject(att_error_code(e));
                    }
                }
            } else {
                let _ = read_event.accept();
            }
            None
        }
        GattEvent::Write(write_event) => {
            let subscribe = if Some(write_event.handle()) == server.environment.temperature.cccd_handle {
                let enable = write_event.data().first().is_some_and(|b| b & CCCD_NOTIFY != 0);
                node.notify_handle().map(|handle| LinkEvent::Subscribe {
                    conn: id,
                    handle,
                    enable,
                })
            } else {
                None
            };
            let _ = write_event.accept();
            subscribe.map(NodeEvent::Link)
        }
        GattEvent::Other(other_event) => {
            let _ = other_event.accept();
            None
        }
    }
}

/// Produce the value through the node and store it in the attribute server
fn refresh_value<M: MeasurementSource>(
    node: &mut SensorNode<M>,
    server: &Server<'_>,
    service: ServiceUuid,
    characteristic: CharacteristicUuid,
) -> Result<(), AttError> {
    let value: AttValue = node.read(service, characteristic)?;
    let stored = match characteristic {
        uuids::MANUFACTURER_NAME => server.set(&server.device_info.manufacturer_name, &value),
        uuids::MODEL_NUMBER => server.set(&server.device_info.model_number, &value),
        uuids::SERIAL_NUMBER => server.set(&server.device_info.serial_number, &value),
        uuids::FIRMWARE_REVISION => server.set(&server.device_info.firmware_revision, &value),
        uuids::HARDWARE_REVISION => server.set(&server.device_info.hardware_revision, &value),
        uuids::BATTERY_LEVEL => {
            let level = value.first().copied().ok_or(AttError::ResourceExhausted)?;
            server.set(&server.battery.level, &level)
        }
        uuids::TEMPERATURE => {
            let bytes: [u8; 2] = value
                .as_slice()
                .try_into()
                .map_err(|_| AttError::ResourceExhausted)?;
            server.set(&server.environment.temperature, &i16::from_le_bytes(bytes))
        }
        _ => return Err(AttError::AttributeNotFound),
    };
    stored.map_err(|_| AttError::ResourceExhausted)
}

/// Map an attribute server handle back to its (service, characteristic) pair
fn characteristic_at(server: &Server<'_>, handle: u16) -> Option<(ServiceUuid, CharacteristicUuid)> {
    let info = &server.device_info;
    let table = [
        (info.manufacturer_name.handle, uuids::DEVICE_INFORMATION, uuids::MANUFACTURER_NAME),
        (info.model_number.handle, uuids::DEVICE_INFORMATION, uuids::MODEL_NUMBER),
        (info.serial_number.handle, uuids::DEVICE_INFORMATION, uuids::SERIAL_NUMBER),
        (info.firmware_revision.handle, uuids::DEVICE_INFORMATION, uuids::FIRMWARE_REVISION),
        (info.hardware_revision.handle, uuids::DEVICE_INFORMATION, uuids::HARDWARE_REVISION),
        (server.battery.level.handle, uuids::BATTERY, uuids::BATTERY_LEVEL),
        (server.environment.temperature.handle, uuids::ENVIRONMENTAL_SENSING, uuids::TEMPERATURE),
    ];
    table
        .iter()
        .find(|(h, _, _)| *h == handle)
        .map(|&(_, service, characteristic)| (service, characteristic))
}

fn att_error_code(error: AttError) -> AttErrorCode {
    match error {
        AttError::AttributeNotFound | AttError::SensorUnavailable => AttErrorCode::UNLIKELY_ERROR,
        AttError::ResourceExhausted => AttErrorCode::INSUFFICIENT_RESOURCES,
    }
}
