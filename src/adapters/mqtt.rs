//! MQTT broker adapter.
//!
//! Implements [`BrokerPort`] on top of the ESP-IDF MQTT client.
//!
//! ## cfg gating
//!
//! - **ESP-IDF (`espidf` feature)**: `EspMqttClient` with a connection flag
//!   maintained from the client's event callback.  The client is created
//!   lazily on the first `connect`; after that the ESP-IDF client handles
//!   TCP reconnects itself and `connect` only waits for the flag.
//! - **all other builds**: an in-memory broker that records retained
//!   messages, for host tests and simulation.

use log::{info, warn};

use crate::app::ports::BrokerPort;
use crate::error::CommsError;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration, QoS};
#[cfg(all(target_os = "espidf", feature = "espidf"))]
use std::sync::Arc;
#[cfg(all(target_os = "espidf", feature = "espidf"))]
use std::sync::atomic::{AtomicBool, Ordering};

/// How long one `connect` call waits for the broker to accept us.
pub const CONNECT_WAIT_MS: u32 = 5_000;

pub struct MqttAdapter {
    url: String,
    client_id: String,
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    client: Option<EspMqttClient<'static>>,
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    connected: Arc<AtomicBool>,
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    sim: SimBroker,
}

/// Host-side broker state.
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
#[derive(Debug, Default)]
struct SimBroker {
    reachable: bool,
    connected: bool,
    connects: u32,
    /// `(topic, payload)` in publish order.  Every entry was retained.
    retained: Vec<(String, String)>,
}

impl MqttAdapter {
    pub fn new(url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: client_id.into(),
            #[cfg(all(target_os = "espidf", feature = "espidf"))]
            client: None,
            #[cfg(all(target_os = "espidf", feature = "espidf"))]
            connected: Arc::new(AtomicBool::new(false)),
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            sim: SimBroker {
                reachable: true,
                ..SimBroker::default()
            },
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn ensure_client(&mut self) -> Result<(), CommsError> {
        if self.client.is_some() {
            return Ok(());
        }
        let config = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            keep_alive_interval: Some(core::time::Duration::from_secs(30)),
            network_timeout: core::time::Duration::from_secs(5),
            ..Default::default()
        };
        let connected = self.connected.clone();
        let client = EspMqttClient::new_cb(&self.url, &config, move |event| match event.payload() {
            EventPayload::Connected(_) => connected.store(true, Ordering::SeqCst),
            EventPayload::Disconnected => connected.store(false, Ordering::SeqCst),
            EventPayload::Error(e) => log::debug!("MQTT: client error {:?}", e),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client creation failed: {:?}", e);
            CommsError::MqttConnectFailed
        })?;
        info!("MQTT: client created for {}", self.url);
        self.client = Some(client);
        Ok(())
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        use esp_idf_hal::delay::FreeRtos;

        self.ensure_client()?;
        let mut waited = 0;
        while !self.connected.load(Ordering::SeqCst) {
            if waited >= CONNECT_WAIT_MS {
                return Err(CommsError::MqttConnectFailed);
            }
            FreeRtos::delay_ms(100);
            waited += 100;
        }
        Ok(())
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_connect(&mut self) -> Result<(), CommsError> {
        self.sim.connects += 1;
        if !self.sim.reachable {
            return Err(CommsError::MqttConnectFailed);
        }
        self.sim.connected = true;
        Ok(())
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &str) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::MqttPublishFailed)?;
        client
            .enqueue(topic, QoS::AtMostOnce, true, payload.as_bytes())
            .map(|_| ())
            .map_err(|_| CommsError::MqttPublishFailed)
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_publish(&mut self, topic: &str, payload: &str) -> Result<(), CommsError> {
        if !self.sim.connected {
            return Err(CommsError::MqttPublishFailed);
        }
        self.sim.retained.push((topic.to_owned(), payload.to_owned()));
        Ok(())
    }
}

// ── Simulation controls ───────────────────────────────────────

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
impl MqttAdapter {
    /// Whether the next `connect` succeeds.
    pub fn set_reachable(&mut self, reachable: bool) {
        self.sim.reachable = reachable;
    }

    /// Simulate the broker dropping the TCP session.
    pub fn drop_connection(&mut self) {
        self.sim.connected = false;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.sim.connects
    }

    pub fn retained(&self) -> &[(String, String)] {
        &self.sim.retained
    }
}

// ───────────────────────────────────────────────────────────────
// BrokerPort
// ───────────────────────────────────────────────────────────────

impl BrokerPort for MqttAdapter {
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn is_connected(&self) -> bool {
        self.sim.connected
    }

    fn connect(&mut self) -> Result<(), CommsError> {
        info!("MQTT: connecting to {} as '{}'", self.url, self.client_id);
        self.platform_connect()
            .inspect(|()| info!("MQTT: connected"))
            .inspect_err(|e| warn!("MQTT: {}", e))
    }

    fn publish_retained(&mut self, topic: &str, payload: &str) -> Result<(), CommsError> {
        self.platform_publish(topic, payload)
    }
}
