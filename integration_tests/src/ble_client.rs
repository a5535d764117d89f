//! BLE client for the sensor node's GATT services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::bleuuid::uuid_from_u16;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const ENVIRONMENTAL_SENSING_UUID: Uuid = uuid_from_u16(0x181A);
pub const MANUFACTURER_NAME_UUID: Uuid = uuid_from_u16(0x2A29);
pub const MODEL_NUMBER_UUID: Uuid = uuid_from_u16(0x2A24);
pub const SERIAL_NUMBER_UUID: Uuid = uuid_from_u16(0x2A25);
pub const FIRMWARE_REVISION_UUID: Uuid = uuid_from_u16(0x2A26);
pub const HARDWARE_REVISION_UUID: Uuid = uuid_from_u16(0x2A27);
pub const BATTERY_LEVEL_UUID: Uuid = uuid_from_u16(0x2A19);
pub const TEMPERATURE_UUID: Uuid = uuid_from_u16(0x2A6E);

/// A temperature notification with its arrival time
#[derive(Debug, Clone, Copy)]
pub struct TemperatureSample {
    pub hundredths: i16,
    pub received: std::time::Instant,
}

/// BLE client for the sensor node.
pub struct BleClient {
    peripheral: Peripheral,
    characteristics: Vec<Characteristic>,
    samples: Arc<Mutex<Vec<TemperatureSample>>>,
}

impl BleClient {
    /// Scan for a device by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = find_device_by_name(&adapter, name, scan_timeout).await?;
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;
        let characteristics = peripheral.characteristics().into_iter().collect();

        let samples = Arc::new(Mutex::new(Vec::new()));

        // Collect temperature notifications in the background
        let samples_clone = samples.clone();
        let peripheral_clone = peripheral.clone();
        tokio::spawn(async move {
            let mut stream = match peripheral_clone.notifications().await {
                Ok(s) => s,
                Err(_) => return,
            };

            while let Some(data) = stream.next().await {
                if data.uuid == TEMPERATURE_UUID && data.value.len() == 2 {
                    let sample = TemperatureSample {
                        hundredths: i16::from_le_bytes([data.value[0], data.value[1]]),
                        received: std::time::Instant::now(),
                    };
                    samples_clone.lock().await.push(sample);
                }
            }
        });

        Ok(Self {
            peripheral,
            characteristics,
            samples,
        })
    }

    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics
            .iter()
            .find(|c| c.uuid == uuid)
            .ok_or_else(|| anyhow!("Characteristic {} not found", uuid))
    }

    /// Read a characteristic value.
    pub async fn read(&self, uuid: Uuid) -> Result<Vec<u8>> {
        let characteristic = self.characteristic(uuid)?;
        Ok(self.peripheral.read(characteristic).await?)
    }

    /// Read a characteristic as a UTF-8 string.
    pub async fn read_string(&self, uuid: Uuid) -> Result<String> {
        Ok(String::from_utf8(self.read(uuid).await?)?)
    }

    /// Enable temperature notifications.
    pub async fn subscribe_temperature(&self) -> Result<()> {
        let characteristic = self.characteristic(TEMPERATURE_UUID)?;
        self.peripheral.subscribe(characteristic).await?;
        Ok(())
    }

    /// Disable temperature notifications.
    pub async fn unsubscribe_temperature(&self) -> Result<()> {
        let characteristic = self.characteristic(TEMPERATURE_UUID)?;
        self.peripheral.unsubscribe(characteristic).await?;
        Ok(())
    }

    /// Take all notifications received so far.
    pub async fn take_samples(&self) -> Vec<TemperatureSample> {
        std::mem::take(&mut *self.samples.lock().await)
    }

    /// Disconnect from the device.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}

/// Find a device by name within the scan timeout.
async fn find_device_by_name(
    adapter: &Adapter,
    name: &str,
    scan_timeout: Duration,
) -> Result<Peripheral> {
    let start = std::time::Instant::now();

    while start.elapsed() < scan_timeout {
        for peripheral in adapter.peripherals().await? {
            if let Some(props) = peripheral.properties().await? {
                let advertises_ess = props.services.contains(&ENVIRONMENTAL_SENSING_UUID);
                if props.local_name.as_deref() == Some(name) && advertises_ess {
                    return Ok(peripheral);
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Err(anyhow!("Device '{}' not found within timeout", name))
}
