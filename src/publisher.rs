//! Reading → MQTT message.
//!
//! Payloads use a line-protocol style layout:
//!
//! ```text
//! <name>,room=<room> value=<value>[ <unit>]
//! ```
//!
//! where `<name>` is the descriptor's topic pattern after substitution
//! (without the prefix).  Every message is published retained at QoS 0,
//! so a subscriber that connects late still sees the last value of each
//! topic.

use log::warn;

use crate::app::events::AppEvent;
use crate::app::ports::{BrokerPort, EventSink};
use crate::config::NodeConfig;
use crate::error::CommsError;
use crate::sensors::Reading;
use crate::topic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publisher {
    prefix: String,
    room: String,
    include_units: bool,
}

impl Publisher {
    pub fn new(prefix: impl Into<String>, room: impl Into<String>, include_units: bool) -> Self {
        Self {
            prefix: prefix.into(),
            room: room.into(),
            include_units,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(&*config.topic_prefix, &*config.room, config.add_units)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn format_payload(&self, name: &str, reading: &Reading) -> String {
        format_payload(name, &self.room, reading, self.include_units)
    }

    /// Template, log, and hand one reading to the broker.
    ///
    /// The `Publishing` event is emitted before the broker is touched, so
    /// the console shows what was attempted even when the transport is
    /// down.
    pub fn publish(
        &self,
        pattern: &str,
        reading: &Reading,
        broker: &mut dyn BrokerPort,
        sink: &mut dyn EventSink,
    ) -> Result<(), CommsError> {
        let resolved = topic::resolve(&self.prefix, pattern, &reading.substitutions);
        let payload = self.format_payload(&resolved.name, reading);

        sink.emit(&AppEvent::Publishing {
            topic: resolved.topic.clone(),
            payload: payload.clone(),
        });

        broker
            .publish_retained(&resolved.topic, &payload)
            .inspect_err(|e| warn!("Publisher: {} not delivered: {}", resolved.topic, e))
    }
}

/// `<name>,room=<room> value=<value>[ <unit>]`.  The unit is appended
/// only when `include_units` is set and the reading has one.
pub fn format_payload(name: &str, room: &str, reading: &Reading, include_units: bool) -> String {
    let mut payload = format!("{},room={} value={}", name, room, reading.value);
    if include_units && !reading.unit.is_empty() {
        payload.push(' ');
        payload.push_str(reading.unit);
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::Substitution;

    #[derive(Default)]
    struct RecordingBroker {
        sent: Vec<(String, String)>,
        fail: bool,
    }

    impl BrokerPort for RecordingBroker {
        fn is_connected(&self) -> bool {
            !self.fail
        }
        fn connect(&mut self) -> Result<(), CommsError> {
            Ok(())
        }
        fn publish_retained(&mut self, topic: &str, payload: &str) -> Result<(), CommsError> {
            if self.fail {
                return Err(CommsError::MqttPublishFailed);
            }
            self.sent.push((topic.into(), payload.into()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Events(Vec<AppEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    #[test]
    fn co2_message_layout() {
        let p = Publisher::new("snuffelaar/", "study", true);
        let mut broker = RecordingBroker::default();
        let mut events = Events::default();
        p.publish("co2", &Reading::new("412", "PPM"), &mut broker, &mut events)
            .unwrap();
        assert_eq!(
            broker.sent,
            vec![(
                "snuffelaar/co2".to_owned(),
                "co2,room=study value=412 PPM".to_owned()
            )]
        );
    }

    #[test]
    fn units_can_be_switched_off() {
        let r = Reading::new("21.50", "°C");
        assert_eq!(
            format_payload("temperature/0", "attic", &r, false),
            "temperature/0,room=attic value=21.50"
        );
    }

    #[test]
    fn empty_unit_never_leaves_trailing_space() {
        let r = Reading::new("3", "");
        assert_eq!(format_payload("x", "r", &r, true), "x,room=r value=3");
    }

    #[test]
    fn substitutions_reach_topic_and_name() {
        let p = Publisher::new("snuffelaar/", "study", true);
        let mut broker = RecordingBroker::default();
        let r = Reading::with(vec![Substitution::new("{index}", "0")], "21.50", "°C");
        p.publish("temperature/{index}", &r, &mut broker, &mut Events::default())
            .unwrap();
        assert_eq!(broker.sent[0].0, "snuffelaar/temperature/0");
        assert_eq!(broker.sent[0].1, "temperature/0,room=study value=21.50 °C");
    }

    #[test]
    fn event_emitted_even_when_transport_fails() {
        let p = Publisher::new("n/", "study", true);
        let mut broker = RecordingBroker {
            fail: true,
            ..Default::default()
        };
        let mut events = Events::default();
        let err = p.publish("co2", &Reading::new("500", "PPM"), &mut broker, &mut events);
        assert_eq!(err, Err(CommsError::MqttPublishFailed));
        assert_eq!(
            events.0,
            vec![AppEvent::Publishing {
                topic: "n/co2".into(),
                payload: "co2,room=study value=500 PPM".into(),
            }]
        );
    }
}
