//! Test rig for integration tests.
//!
//! Wires the compiled-in sensor catalog to simulation drivers and keeps a
//! handle on each driver so tests can change what the chips report
//! between cycles.  Time is a manual clock: every pause advances it, so
//! waits run instantly and elapsed-time assertions are exact.

use std::cell::Cell;

use snuffelaar::adapters::mqtt::MqttAdapter;
use snuffelaar::adapters::ota::OtaAdapter;
use snuffelaar::app::events::AppEvent;
use snuffelaar::app::ports::{Clock, EventSink, PortalTrigger};
use snuffelaar::app::service::NodeService;
use snuffelaar::config::{NodeConfig, SensorSettings};
use snuffelaar::drivers::sim::{SimClimate, SimCo2, SimParticulate, SimTemperatureBus};
use snuffelaar::scheduler::{CycleIo, CycleReport};
use snuffelaar::sensors::catalog::{CatalogDrivers, register_catalog};
use snuffelaar::sensors::registry::SensorRegistry;

pub const ALL_SENSORS: [&str; 5] = ["DS18B20", "MH-Z19", "PMS7003", "BME280_RH", "BME280_BP"];

// ── ManualClock ───────────────────────────────────────────────

#[derive(Default)]
pub struct ManualClock {
    now: Cell<u64>,
    paused: Cell<u64>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    /// Total time spent in `pause_ms`.
    pub fn paused_ms(&self) -> u64 {
        self.paused.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn pause_ms(&self, ms: u64) {
        self.paused.set(self.paused.get() + ms);
        self.advance(ms);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    /// `(topic, payload)` of every `Publishing` event, in order.
    pub fn publishes(&self) -> Vec<(String, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Publishing { topic, payload } => Some((topic.clone(), payload.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn alarms(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::Alarm { .. }))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── ScriptedTrigger ───────────────────────────────────────────

/// Fires on the `n`th check (1-based), then never again.
#[derive(Default)]
pub struct ScriptedTrigger {
    pub fire_on_check: Option<u32>,
    pub checks: u32,
}

#[allow(dead_code)]
impl ScriptedTrigger {
    pub fn fire_on(check: u32) -> Self {
        Self {
            fire_on_check: Some(check),
            checks: 0,
        }
    }
}

impl PortalTrigger for ScriptedTrigger {
    fn triggered(&mut self, _clock: &dyn Clock) -> bool {
        self.checks += 1;
        self.fire_on_check == Some(self.checks)
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub struct Rig {
    pub temperature: SimTemperatureBus,
    pub co2: SimCo2,
    pub particulate: SimParticulate,
    pub climate: SimClimate,
    pub clock: ManualClock,
    pub broker: MqttAdapter,
    pub ota: OtaAdapter,
    pub trigger: ScriptedTrigger,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self {
            temperature: SimTemperatureBus::new(&[]),
            co2: SimCo2::new(0),
            particulate: SimParticulate::new(None),
            climate: SimClimate::default(),
            clock: ManualClock::default(),
            broker: MqttAdapter::new("mqtt://test.mosquitto.org:1883", "snuffelaar-test"),
            ota: OtaAdapter::new(false),
            trigger: ScriptedTrigger::default(),
            sink: RecordingSink::default(),
        }
    }

    pub fn registry(&self) -> SensorRegistry {
        let mut registry = SensorRegistry::new();
        register_catalog(
            &mut registry,
            CatalogDrivers {
                temperature: self.temperature.clone(),
                co2: self.co2.clone(),
                particulate: self.particulate.clone(),
                humidity: self.climate.clone(),
                pressure: self.climate.clone(),
            },
        )
        .expect("catalog ids are unique");
        registry
    }

    /// Build a node already in Polling: configured, connected through a
    /// simulated radio and initialised.
    pub fn polling_node(&mut self, config: &NodeConfig) -> NodeService {
        use snuffelaar::adapters::wifi::WifiAdapter;

        let mut node = NodeService::new(self.registry());
        node.configure(config, &mut self.sink).expect("config valid");
        let mut wifi = WifiAdapter::new("snuffelaar-test");
        wifi.set_credentials("HomeWiFi", "mysecret8");
        node.connect(&mut wifi, &mut self.trigger, &self.clock, &mut self.sink)
            .expect("sim WiFi connects");
        node.initialize(&self.clock, &mut self.sink)
            .expect("initialise");
        self.sink.clear();
        node
    }

    pub fn cycle(&mut self, node: &mut NodeService) -> CycleReport {
        let mut io = CycleIo {
            clock: &self.clock,
            broker: &mut self.broker,
            updates: &mut self.ota,
            trigger: &mut self.trigger,
            sink: &mut self.sink,
        };
        node.poll_once(&mut io).expect("node is polling")
    }
}

/// Default config with only `ids` enabled.
#[allow(dead_code)]
pub fn config_with_only(ids: &[&str]) -> NodeConfig {
    let mut config = NodeConfig::default();
    for id in ALL_SENSORS {
        config.sensors.insert(
            id.to_owned(),
            SensorSettings {
                enabled: ids.contains(&id),
                topic: None,
            },
        );
    }
    config
}
