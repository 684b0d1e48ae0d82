//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the ESP-IDF
//! logger (UART in production).  Every publish shows up as a
//! `<topic> <payload>` line before the broker sees it, which is the
//! console trace the node has always printed.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Publishing { topic, payload } => {
                info!("{} {}", topic, payload);
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::BrokerReconnect { success: true } => {
                info!("MQTT  | reconnected");
            }
            AppEvent::BrokerReconnect { success: false } => {
                warn!("MQTT  | reconnect failed, retrying next cycle");
            }
            AppEvent::Alarm {
                sensor,
                value,
                threshold,
            } => {
                warn!("ALARM | {} at {} (threshold {})", sensor, value, threshold);
            }
            AppEvent::SensorFaulted { sensor } => {
                warn!("FAULT | {} failed init, not polled", sensor);
            }
            AppEvent::CycleCompleted(s) => {
                debug!(
                    "CYCLE | #{} published={} failed={} no_data={} truncated={} {}ms",
                    s.cycle, s.published, s.publish_failures, s.no_data, s.truncated, s.elapsed_ms
                );
            }
        }
    }
}
