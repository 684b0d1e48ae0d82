//! Configuration portal form.
//!
//! The portal is a single HTML form served from the node's own access
//! point.  This module renders that form from the current config and the
//! registered sensors, and turns a submitted
//! `application/x-www-form-urlencoded` body back into config changes.
//! The HTTP plumbing lives in [`wifi`](super::wifi); everything here is
//! plain string handling and runs on the host.
//!
//! Field names:
//!
//! | field                  | meaning                               |
//! |------------------------|---------------------------------------|
//! | `ssid`, `password`     | station credentials                   |
//! | `mqtt_host` ... `room` | [`NodeConfig`] scalars                |
//! | `sensor.<ID>.enabled`  | checkbox, absent means disabled       |
//! | `sensor.<ID>.topic`    | topic pattern override                |
//! | `tunable.<key>`        | integer tunable                       |

use core::fmt::Write;

use log::warn;

use crate::app::ports::Settings;
use crate::config::{NodeConfig, SensorSettings};
use crate::sensors::co2;
use crate::sensors::registry::SensorRegistry;

/// Everything the user submitted from the portal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortalSubmission {
    pub ssid: String,
    pub password: String,
    fields: Vec<(String, String)>,
}

impl PortalSubmission {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Merge the submitted values into `config`.  `sensor_ids` lists every
    /// registered descriptor, so an unticked checkbox can be told apart
    /// from a sensor the form never showed.
    pub fn apply_to(&self, config: &mut NodeConfig, sensor_ids: &[&str]) {
        if let Some(v) = self.field("mqtt_host") {
            config.mqtt_host = v.to_owned();
        }
        if let Some(v) = self.field("mqtt_port") {
            match v.parse() {
                Ok(port) => config.mqtt_port = port,
                Err(_) => warn!("Portal: ignoring mqtt_port '{}'", v),
            }
        }
        if let Some(v) = self.field("topic_prefix") {
            config.topic_prefix = v.to_owned();
        }
        if let Some(v) = self.field("interval_secs") {
            match v.parse() {
                Ok(secs) => config.interval_secs = secs,
                Err(_) => warn!("Portal: ignoring interval_secs '{}'", v),
            }
        }
        if let Some(v) = self.field("room") {
            config.room = v.to_owned();
        }
        config.add_units = self.field("add_units").is_some();
        config.ota_enabled = self.field("ota_enabled").is_some();

        for &id in sensor_ids {
            let topic = self
                .field(&format!("sensor.{id}.topic"))
                .filter(|t| !t.is_empty())
                .map(str::to_owned);
            let settings = SensorSettings {
                enabled: self.field(&format!("sensor.{id}.enabled")).is_some(),
                topic,
            };
            config.sensors.insert(id.to_owned(), settings);
        }

        for (key, value) in &self.fields {
            let Some(name) = key.strip_prefix("tunable.") else {
                continue;
            };
            match value.parse() {
                Ok(v) => {
                    config.tunables.insert(name.to_owned(), v);
                }
                Err(_) => warn!("Portal: ignoring tunable {}='{}'", name, value),
            }
        }
    }
}

/// Parse a urlencoded form body.
pub fn parse_form(body: &str) -> PortalSubmission {
    let mut submission = PortalSubmission::default();
    for pair in body.split('&').filter(|p| !p.is_empty()) {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let (k, v) = (url_decode(k), url_decode(v));
        match k.as_str() {
            "ssid" => submission.ssid = v,
            "password" => submission.password = v,
            _ => submission.fields.push((k, v)),
        }
    }
    submission
}

/// `+` is a space, `%XX` a byte.  Malformed escapes are kept literally.
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push((h << 4) | l);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// One row per registered descriptor: `(id, description, topic pattern)`.
pub type SensorRow<'a> = (&'a str, &'a str, &'a str);

/// Render the portal page.  `tunables` lists the integer tunables to
/// offer, with their effective values.
pub fn render_form(
    hostname: &str,
    config: &NodeConfig,
    sensors: &[SensorRow<'_>],
    tunables: &[(&str, i32)],
) -> String {
    let mut page = String::with_capacity(4096);
    let checked = |on: bool| if on { " checked" } else { "" };

    // Writing into a String cannot fail.
    let _ = write!(
        page,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width\">\
         <title>{host}</title></head><body><h1>{host}</h1>\
         <form method=\"post\" action=\"/\">\
         <h2>WiFi</h2>\
         <p>SSID <input name=\"ssid\"></p>\
         <p>Password <input name=\"password\" type=\"password\"></p>\
         <h2>MQTT</h2>\
         <p>Broker <input name=\"mqtt_host\" value=\"{mqtt_host}\"></p>\
         <p>Port <input name=\"mqtt_port\" type=\"number\" value=\"{mqtt_port}\"></p>\
         <p>Topic prefix <input name=\"topic_prefix\" value=\"{prefix}\"></p>\
         <p>Interval (s) <input name=\"interval_secs\" type=\"number\" min=\"1\" max=\"3600\" value=\"{interval}\"></p>\
         <p>Room <input name=\"room\" value=\"{room}\"></p>\
         <p><label><input name=\"add_units\" type=\"checkbox\"{units}> Add units</label></p>\
         <p><label><input name=\"ota_enabled\" type=\"checkbox\"{ota}> Remote updates</label></p>\
         <h2>Sensors</h2>",
        host = html_escape(hostname),
        mqtt_host = html_escape(&config.mqtt_host),
        mqtt_port = config.mqtt_port,
        prefix = html_escape(&config.topic_prefix),
        interval = config.interval_secs,
        room = html_escape(&config.room),
        units = checked(config.add_units),
        ota = checked(config.ota_enabled),
    );

    for &(id, description, topic) in sensors {
        let enabled = config.sensor(id).enabled;
        let _ = write!(
            page,
            "<fieldset><legend>{id} ({desc})</legend>\
             <label><input name=\"sensor.{id}.enabled\" type=\"checkbox\"{en}> Enabled</label> \
             Topic <input name=\"sensor.{id}.topic\" value=\"{topic}\"></fieldset>",
            id = html_escape(id),
            desc = html_escape(description),
            en = checked(enabled),
            topic = html_escape(topic),
        );
    }

    for &(key, value) in tunables {
        let _ = write!(
            page,
            "<p>{k} <input name=\"tunable.{k}\" type=\"number\" value=\"{v}\"></p>",
            k = html_escape(key),
            v = value,
        );
    }

    page.push_str("<p><button>Save</button></p></form></body></html>");
    page
}

/// Render the portal for `registry` as configured by `config`.
pub fn page_for(hostname: &str, config: &NodeConfig, registry: &SensorRegistry) -> String {
    let rows: Vec<SensorRow<'_>> = registry
        .iter()
        .map(|d| (d.id(), d.description(), d.topic()))
        .collect();
    let mut tunables = Vec::new();
    if registry.get(co2::ID).is_some() {
        let alarm = config.integer(
            co2::ALARM_KEY,
            0,
            co2::ALARM_MAX_PPM,
            co2::ALARM_DEFAULT_PPM,
        );
        tunables.push((co2::ALARM_KEY, alarm));
    }
    render_form(hostname, config, &rows, &tunables)
}

/// `config` with `submission` merged in, or `None` when the submission
/// changes nothing that is stored in the config.
pub fn merged_config(
    submission: &PortalSubmission,
    config: &NodeConfig,
    registry: &SensorRegistry,
) -> Option<NodeConfig> {
    let ids: Vec<&str> = registry.iter().map(|d| d.id()).collect();
    let mut updated = config.clone();
    submission.apply_to(&mut updated, &ids);
    (updated != *config).then_some(updated)
}
