#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::gpio::{Level, Output, OutputConfig};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::usb_serial_jtag::{UsbSerialJtag, UsbSerialJtagRx, UsbSerialJtagTx};
use esp_hal::Async;
use static_cell::StaticCell;

use sensor_node_rust_firmware::node::{NodeConfig, SensorNode};
use sensor_node_rust_firmware::sensor::rng::RngTemperature;
use sensor_node_rust_firmware::tasks;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// Type alias for the BLE controller
type BleController = trouble_host::prelude::ExternalController<
    esp_radio::ble::controller::BleConnector<'static>,
    10,
>;

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    // Initialise heap allocator for BLE support (64KB - BLE requires significant heap)
    esp_alloc::heap_allocator!(size: 64 * 1024);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let led = Output::new(peripherals.GPIO48, Level::Low, OutputConfig::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let usb_serial = UsbSerialJtag::new(peripherals.USB_DEVICE).into_async();
    let (usb_rx, usb_tx) = usb_serial.split();

    // Random static address derived from the eFuse MAC
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let address = [mac[3], mac[4], mac[5], 0x5E, 0x45, 0xC0];

    // Attribute table is fixed at build time; rejection is a firmware defect
    let node = SensorNode::new(NodeConfig::default(), RngTemperature::new(Rng::new()))
        .expect("Attribute table rejected");

    // Initialise esp-radio for BLE support (must be after esp_rtos::start)
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio")
    );

    // Create BLE connector (ownership is passed to ExternalController)
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialize BLE connector");

    // Wrap in ExternalController for trouble-host compatibility
    let controller: BleController = trouble_host::prelude::ExternalController::new(ble_connector);

    log::info!("Boot: {} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, usb_rx, usb_tx, led, controller, node, address));
    })
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    usb_rx: UsbSerialJtagRx<'static, Async>,
    usb_tx: UsbSerialJtagTx<'static, Async>,
    led: Output<'static>,
    ble_controller: BleController,
    node: SensorNode<RngTemperature>,
    address: [u8; 6],
) {
    spawner.must_spawn(led_task(led));
    spawner.must_spawn(shell_task(usb_rx, usb_tx));
    spawner.must_spawn(ble_host_task(ble_controller, node, address));
}

/// Heartbeat LED
#[embassy_executor::task]
async fn led_task(led: Output<'static>) {
    tasks::led_task(led).await;
}

/// Line shell on the USB serial console
#[embassy_executor::task]
async fn shell_task(
    usb_rx: UsbSerialJtagRx<'static, Async>,
    usb_tx: UsbSerialJtagTx<'static, Async>,
) {
    tasks::shell_task(usb_rx, usb_tx).await;
}

/// BLE host and sensor node event loop
#[embassy_executor::task]
async fn ble_host_task(controller: BleController, node: SensorNode<RngTemperature>, address: [u8; 6]) {
    tasks::ble_task(controller, node, address).await;
}
