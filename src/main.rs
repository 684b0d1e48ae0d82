//! Snuffelaar firmware entry point
//!
//! Hexagonal architecture around a single cooperative poll loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  WifiAdapter          MqttAdapter    NvsAdapter   Esp32Time    │
//! │  (Connectivity +      (Broker)       (Config)     (Clock)      │
//! │   Provisioning)       OtaAdapter     LogEventSink PortalButton │
//! │                       (Update)       (EventSink)  (Trigger)    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  Lifecycle · SensorRegistry · Publisher · Scheduler    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use esp_idf_hal::gpio::{AnyIOPin, AnyInputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{self, UartDriver};
use esp_idf_hal::units::{FromValueType, Hertz};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use snuffelaar::adapters::device_id;
use snuffelaar::adapters::log_sink::LogEventSink;
use snuffelaar::adapters::mqtt::MqttAdapter;
use snuffelaar::adapters::nvs::NvsAdapter;
use snuffelaar::adapters::ota::OtaAdapter;
use snuffelaar::adapters::portal;
use snuffelaar::adapters::time::Esp32TimeAdapter;
use snuffelaar::adapters::wifi::WifiAdapter;
use snuffelaar::app::ports::{ConfigPort, PortalTrigger};
use snuffelaar::app::service::NodeService;
use snuffelaar::config::NodeConfig;
use snuffelaar::drivers::button::PortalButton;
use snuffelaar::drivers::esp::{I2cClimate, OneWireTemperatureBus, UartCo2, UartParticulate};
use snuffelaar::lifecycle::NodeState;
use snuffelaar::pins;
use snuffelaar::scheduler::CycleIo;
use snuffelaar::sensors::catalog::{CatalogDrivers, register_catalog};
use snuffelaar::sensors::registry::SensorRegistry;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Snuffelaar v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;
    let config = nvs.load_or_default();

    // ── Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    let hostname = device_id::hostname(&mac);
    info!("Device ID: {} (hostname: {})", device_id::device_id(&mac), hostname);

    // ── 3. Sensor buses + catalog ─────────────────────────────
    info!(
        "Sensors: 1-Wire GPIO{}, MH-Z19 GPIO{}/{}, PMS7003 GPIO{}/{}, BME280 0x{:02x} on GPIO{}/{}",
        pins::ONE_WIRE_GPIO,
        pins::MHZ19_RX_GPIO,
        pins::MHZ19_TX_GPIO,
        pins::PMS7003_RX_GPIO,
        pins::PMS7003_TX_GPIO,
        pins::BME280_I2C_ADDR,
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO,
    );
    // SAFETY: each sensor GPIO below is handed to exactly one driver.
    let (one_wire, sda, scl, co2_tx, co2_rx, pm_tx, pm_rx) = unsafe {
        (
            AnyIOPin::new(pins::ONE_WIRE_GPIO),
            AnyIOPin::new(pins::I2C_SDA_GPIO),
            AnyIOPin::new(pins::I2C_SCL_GPIO),
            AnyIOPin::new(pins::MHZ19_TX_GPIO),
            AnyIOPin::new(pins::MHZ19_RX_GPIO),
            AnyIOPin::new(pins::PMS7003_TX_GPIO),
            AnyIOPin::new(pins::PMS7003_RX_GPIO),
        )
    };
    let uart_config = uart::config::Config::default().baudrate(Hertz(pins::SENSOR_UART_BAUD));

    let temperature = OneWireTemperatureBus::new(PinDriver::input_output_od(one_wire)?)
        .map_err(|e| anyhow::anyhow!("1-Wire GPIO{}: {}", pins::ONE_WIRE_GPIO, e))?;
    let co2 = UartCo2::new(UartDriver::new(
        peripherals.uart1,
        co2_tx,
        co2_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart_config,
    )?);
    let particulate = UartParticulate::new(UartDriver::new(
        peripherals.uart2,
        pm_tx,
        pm_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &uart_config,
    )?);
    let climate = I2cClimate::new(I2cDriver::new(
        peripherals.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(100.kHz().into()),
    )?);

    let mut registry = SensorRegistry::new();
    register_catalog(
        &mut registry,
        CatalogDrivers {
            temperature,
            co2,
            particulate,
            humidity: climate.clone(),
            pressure: climate,
        },
    )?;

    // ── 4. Construct adapters ─────────────────────────────────
    let clock = Esp32TimeAdapter::new();
    let mut sink = LogEventSink::new();

    let mut node = NodeService::new(registry);
    node.configure(&config, &mut sink)?;

    let mut wifi = WifiAdapter::new(peripherals.modem, sysloop, Some(nvs_partition), &hostname)?;

    // SAFETY: the button GPIO is not claimed by any other driver.  The
    // board pulls it up externally.
    let button_pin = unsafe { AnyInputPin::new(pins::BUTTON_GPIO) };
    let mut button = PortalButton::new(PinDriver::input(button_pin)?);

    let mut broker = MqttAdapter::new(config.broker_url(), hostname.as_str());
    let mut ota = OtaAdapter::new(config.ota_enabled);

    // ── 5. Connect + initialise sensors ───────────────────────
    bring_up(&mut node, &mut wifi, &mut button, &clock, &mut sink, &nvs, &config);

    info!("Node ready. Entering poll loop.");

    // ── 6. Poll loop ──────────────────────────────────────────
    loop {
        let mut io = CycleIo {
            clock: &clock,
            broker: &mut broker,
            updates: &mut ota,
            trigger: &mut button,
            sink: &mut sink,
        };
        node.poll_once(&mut io)?;

        if node.state() == NodeState::Portal {
            wifi.set_portal_page(portal::page_for(&hostname, &config, node.registry()));
            node.run_portal(&mut wifi, &mut sink)?;
            persist_submission(&mut wifi, &nvs, &config, &node);
            bring_up(&mut node, &mut wifi, &mut button, &clock, &mut sink, &nvs, &config);
        }
    }
}

/// Connecting, then Initializing.  Any failure restarts the chip.
fn bring_up(
    node: &mut NodeService,
    wifi: &mut WifiAdapter,
    button: &mut dyn PortalTrigger,
    clock: &Esp32TimeAdapter,
    sink: &mut LogEventSink,
    nvs: &NvsAdapter,
    config: &NodeConfig,
) {
    let hostname = wifi.hostname().to_owned();
    wifi.set_portal_page(portal::page_for(&hostname, config, node.registry()));

    if let Err(e) = node.connect(wifi, button, clock, sink) {
        error!("Connect failed: {}, restarting", e);
        esp_idf_hal::reset::restart();
    }
    // The portal may have run while connecting.
    persist_submission(wifi, nvs, config, node);

    if let Err(e) = node.initialize(clock, sink) {
        error!("Initialise failed: {}, restarting", e);
        esp_idf_hal::reset::restart();
    }
}

/// Store what the user saved in the portal.  Descriptor settings are
/// frozen for this boot, so a changed config restarts the node.
fn persist_submission(wifi: &mut WifiAdapter, nvs: &NvsAdapter, config: &NodeConfig, node: &NodeService) {
    let Some(submission) = wifi.take_submission() else {
        return;
    };
    let Some(updated) = portal::merged_config(&submission, config, node.registry()) else {
        info!("Portal: config unchanged");
        return;
    };
    match nvs.save(&updated) {
        Ok(()) => {
            info!("Portal: config saved, restarting");
            esp_idf_hal::reset::restart();
        }
        Err(e) => warn!("Portal: config not saved ({}), keeping current settings", e),
    }
}
