//! Node configuration parameters
//!
//! Every tunable the node consumes.  Values are supplied by the
//! provisioning portal, persisted through the [`ConfigPort`], and treated
//! as read-only once the node leaves the Configuring state.
//!
//! [`ConfigPort`]: crate::app::ports::ConfigPort

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, Settings};
use crate::sensors::co2;

/// Valid range for the publish interval, in seconds.
pub const INTERVAL_RANGE_SECS: core::ops::RangeInclusive<u32> = 1..=3600;

/// Integer tunables the firmware reads, with the range each accepts.
pub const KNOWN_TUNABLES: &[(&str, core::ops::RangeInclusive<i32>)] =
    &[(co2::ALARM_KEY, 0..=co2::ALARM_MAX_PPM)];

/// Per-descriptor overrides, keyed by descriptor id in [`NodeConfig::sensors`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSettings {
    /// Whether the descriptor takes part in init/prepare/fetch.
    pub enabled: bool,
    /// Topic pattern override.  `None` keeps the compiled-in default.
    pub topic: Option<String>,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            topic: None,
        }
    }
}

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Broker ---
    /// MQTT broker hostname
    pub mqtt_host: String,
    /// MQTT broker TCP port
    pub mqtt_port: u16,
    /// Prefix prepended to every resolved topic pattern (ending with '/' advised)
    pub topic_prefix: String,

    // --- Publishing ---
    /// Lower bound on the poll cycle period (seconds)
    pub interval_secs: u32,
    /// Append the unit of measurement to payloads
    pub add_units: bool,
    /// Room tag written into every payload (`,room=<room>`)
    pub room: String,

    // --- Connectivity ---
    /// How long Connecting may wait for the station to associate (ms)
    pub connect_timeout_ms: u32,
    /// Accept remote firmware updates (uses the portal password)
    pub ota_enabled: bool,

    // --- Sensors ---
    /// Per-descriptor enable flag and topic override
    pub sensors: BTreeMap<String, SensorSettings>,
    /// Descriptor-specific integer tunables (e.g. `MH-Z19_alarm`)
    pub tunables: BTreeMap<String, i32>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "test.mosquitto.org".into(),
            mqtt_port: 1883,
            topic_prefix: "snuffelaar/".into(),

            interval_secs: 5,
            add_units: true,
            room: "study".into(),

            connect_timeout_ms: 30_000,
            ota_enabled: false,

            sensors: BTreeMap::new(),
            tunables: BTreeMap::new(),
        }
    }
}

impl NodeConfig {
    /// Publish interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        u64::from(self.interval_secs) * 1000
    }

    /// `mqtt://host:port`, as expected by the ESP-IDF MQTT client.
    pub fn broker_url(&self) -> String {
        format!("mqtt://{}:{}", self.mqtt_host, self.mqtt_port)
    }

    /// Settings for one descriptor, falling back to the defaults
    /// (enabled, compiled-in topic) when the portal never stored any.
    pub fn sensor(&self, id: &str) -> SensorSettings {
        self.sensors.get(id).cloned().unwrap_or_default()
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt_host.is_empty() || self.mqtt_host.len() > 64 {
            return Err(ConfigError::ValidationFailed(
                "mqtt_host must be 1-64 characters",
            ));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be 1-65535"));
        }
        if self.topic_prefix.len() > 64 {
            return Err(ConfigError::ValidationFailed(
                "topic_prefix must be at most 64 characters",
            ));
        }
        if !INTERVAL_RANGE_SECS.contains(&self.interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "interval_secs must be 1-3600",
            ));
        }
        if !is_valid_room(&self.room) {
            return Err(ConfigError::ValidationFailed(
                "room must be 1-32 printable characters without ',', ' ' or '='",
            ));
        }
        if !(1_000..=300_000).contains(&self.connect_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "connect_timeout_ms must be 1000-300000",
            ));
        }
        for s in self.sensors.values() {
            if let Some(topic) = &s.topic {
                if topic.is_empty() || topic.len() > 128 {
                    return Err(ConfigError::ValidationFailed(
                        "sensor topic must be 1-128 characters",
                    ));
                }
            }
        }
        for (key, range) in KNOWN_TUNABLES {
            match self.tunables.get(*key) {
                Some(v) if !range.contains(v) => {
                    return Err(ConfigError::ValidationFailed("tunable out of range"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// The room tag lands inside a line-protocol style payload, so the
/// separators of that format are not allowed in it.
fn is_valid_room(room: &str) -> bool {
    !room.is_empty()
        && room.len() <= 32
        && room
            .bytes()
            .all(|b| (0x21..=0x7E).contains(&b) && b != b',' && b != b'=')
}

impl Settings for NodeConfig {
    fn integer(&self, key: &str, min: i32, max: i32, default: i32) -> i32 {
        match self.tunables.get(key) {
            Some(v) if (min..=max).contains(v) => *v,
            Some(v) => {
                log::warn!(
                    "Config: tunable '{}'={} outside {}..={}, using {}",
                    key, v, min, max, default
                );
                default
            }
            None => default,
        }
    }
}
