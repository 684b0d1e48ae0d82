//! WiFi station adapter and configuration portal.
//!
//! Implements [`ConnectivityPort`] (station mode) and [`ProvisioningPort`]
//! (access point + HTTP form) over the same radio.
//!
//! ## cfg gating
//!
//! - **ESP-IDF (`espidf` feature)**: `esp_idf_svc::wifi::EspWifi`, driven
//!   non-blocking so the node service can poll the portal button while
//!   association is in progress.  The portal serves the form from
//!   [`portal`](super::portal) with `EspHttpServer` on the node's own AP.
//! - **all other builds**: simulation stubs for host-side tests.

use log::{info, warn};

use super::portal::{self, PortalSubmission};
use crate::app::ports::{ConnectivityError, ConnectivityPort, ProvisioningPort};

#[cfg(all(target_os = "espidf", feature = "espidf"))]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn valid_ssid(ssid: &str) -> bool {
    !ssid.is_empty() && ssid.len() <= 32 && is_printable_ascii(ssid)
}

fn valid_password(password: &str) -> bool {
    password.is_empty() || (8..=64).contains(&password.len())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    hostname: heapless::String<24>,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    portal_page: String,
    submission: Option<PortalSubmission>,
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    wifi: EspWifi<'static>,
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    sim: SimRadio,
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
#[derive(Debug, Default)]
struct SimRadio {
    started: bool,
    /// SSIDs a started station can associate with.  `None`: any.
    networks: Option<Vec<String>>,
    /// Bodies the simulated user will submit, one per portal visit.
    pending_forms: std::collections::VecDeque<String>,
    portal_visits: u32,
}

impl WifiAdapter {
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    pub fn new(
        modem: esp_idf_hal::modem::Modem,
        sysloop: esp_idf_svc::eventloop::EspSystemEventLoop,
        nvs: Option<esp_idf_svc::nvs::EspDefaultNvsPartition>,
        hostname: &str,
    ) -> Result<Self, esp_idf_svc::sys::EspError> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        let mut adapter = Self::with_hostname(hostname, wifi);
        adapter.restore_credentials();
        Ok(adapter)
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn with_hostname(hostname: &str, wifi: EspWifi<'static>) -> Self {
        Self {
            hostname: truncated(hostname),
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            portal_page: String::new(),
            submission: None,
            wifi,
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: truncated(hostname),
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            portal_page: String::new(),
            submission: None,
            sim: SimRadio::default(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn has_credentials(&self) -> bool {
        !self.ssid.is_empty()
    }

    /// Store station credentials.  Invalid ones are rejected and the
    /// previous credentials kept.
    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> bool {
        if !valid_ssid(ssid) || !valid_password(password) {
            warn!("WiFi: rejecting credentials for '{}'", ssid);
            return false;
        }
        self.ssid.clear();
        self.password.clear();
        // Lengths were checked above, so neither push can overflow.
        let _ = self.ssid.push_str(ssid);
        let _ = self.password.push_str(password);
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        true
    }

    /// Page served by the next portal visit.
    pub fn set_portal_page(&mut self, page: String) {
        self.portal_page = page;
    }

    /// What the user saved in the last portal visit, if anything.
    pub fn take_submission(&mut self) -> Option<PortalSubmission> {
        self.submission.take()
    }

    fn accept_form(&mut self, body: &str) {
        let submission = portal::parse_form(body);
        if !submission.ssid.is_empty() {
            self.set_credentials(&submission.ssid, &submission.password);
        }
        self.submission = Some(submission);
    }

    // ── Platform-specific ─────────────────────────────────────

    /// Pick up the station config ESP-IDF persisted in NVS on an earlier
    /// boot.
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn restore_credentials(&mut self) {
        if let Ok(Configuration::Client(client)) = self.wifi.get_configuration() {
            if !client.ssid.is_empty() {
                self.ssid = truncated(client.ssid.as_str());
                self.password = truncated(client.password.as_str());
            }
        }
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_begin(&mut self) -> Result<(), ConnectivityError> {
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.ssid.as_str().try_into().map_err(|_| ConnectivityError::StartFailed)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::StartFailed)?,
            ..Default::default()
        });
        let started = self
            .wifi
            .set_configuration(&config)
            .and_then(|()| self.wifi.start())
            .and_then(|()| self.wifi.connect());
        started.map_err(|e| {
            warn!("WiFi: start failed: {:?}", e);
            ConnectivityError::StartFailed
        })
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_begin(&mut self) -> Result<(), ConnectivityError> {
        self.sim.started = true;
        Ok(())
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_is_connected(&self) -> bool {
        self.sim.started
            && self
                .sim
                .networks
                .as_ref()
                .is_none_or(|n| n.iter().any(|ssid| ssid == self.ssid.as_str()))
    }

    /// Run the access point and form server until a form is submitted.
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn platform_portal(&mut self) -> anyhow::Result<String> {
        use std::sync::{Arc, Mutex};

        use esp_idf_hal::delay::FreeRtos;
        use esp_idf_svc::http::Method;
        use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpServer};
        use esp_idf_svc::io::{Read, Write};

        const MAX_FORM_BYTES: usize = 4096;

        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();
        self.wifi
            .set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
                ssid: self
                    .hostname
                    .as_str()
                    .try_into()
                    .map_err(|_| anyhow::anyhow!("hostname too long for SSID"))?,
                auth_method: AuthMethod::None,
                ..Default::default()
            }))?;
        self.wifi.start()?;
        info!("Portal: access point '{}' up", self.hostname);

        let page = Arc::new(core::mem::take(&mut self.portal_page));
        let submitted: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let mut server = EspHttpServer::new(&HttpConfig::default())?;
        server.fn_handler::<anyhow::Error, _>("/", Method::Get, {
            let page = page.clone();
            move |req| {
                req.into_ok_response()?.write_all(page.as_bytes())?;
                Ok(())
            }
        })?;
        server.fn_handler::<anyhow::Error, _>("/", Method::Post, {
            let submitted = submitted.clone();
            move |mut req| {
                let mut body = Vec::new();
                let mut buf = [0u8; 512];
                loop {
                    let n = req.read(&mut buf)?;
                    if n == 0 || body.len() + n > MAX_FORM_BYTES {
                        break;
                    }
                    body.extend_from_slice(&buf[..n]);
                }
                if let Ok(mut slot) = submitted.lock() {
                    *slot = Some(String::from_utf8_lossy(&body).into_owned());
                }
                req.into_ok_response()?
                    .write_all(b"<html><body>Saved. Reconnecting...</body></html>")?;
                Ok(())
            }
        })?;

        loop {
            let body = submitted.lock().ok().and_then(|mut slot| slot.take());
            if let Some(body) = body {
                // Let the response reach the browser before the AP goes away.
                FreeRtos::delay_ms(500);
                drop(server);
                let _ = self.wifi.stop();
                self.portal_page = Arc::try_unwrap(page).unwrap_or_default();
                return Ok(body);
            }
            FreeRtos::delay_ms(100);
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn platform_portal(&mut self) -> anyhow::Result<String> {
        self.sim.started = false;
        self.sim.portal_visits += 1;
        self.sim
            .pending_forms
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("portal left without submitting"))
    }
}

// ── Simulation controls ───────────────────────────────────────

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
impl WifiAdapter {
    /// Whether a started station associates, whatever its SSID.
    pub fn set_ap_in_range(&mut self, in_range: bool) {
        self.sim.networks = if in_range { None } else { Some(Vec::new()) };
    }

    /// Only these SSIDs associate.
    pub fn set_networks_in_range(&mut self, ssids: &[&str]) {
        self.sim.networks = Some(ssids.iter().map(|s| (*s).to_owned()).collect());
    }

    /// Queue a form body for the next portal visit.
    pub fn queue_form(&mut self, body: &str) {
        self.sim.pending_forms.push_back(body.to_owned());
    }

    pub fn portal_visits(&self) -> u32 {
        self.sim.portal_visits
    }

    pub fn portal_page(&self) -> &str {
        &self.portal_page
    }
}

fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

// ───────────────────────────────────────────────────────────────
// Ports
// ───────────────────────────────────────────────────────────────

impl ConnectivityPort for WifiAdapter {
    fn begin(&mut self) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        info!("WiFi: connecting to '{}' as {}", self.ssid, self.hostname);
        self.platform_begin()
    }

    fn is_connected(&self) -> bool {
        self.platform_is_connected()
    }
}

impl ProvisioningPort for WifiAdapter {
    fn run_portal(&mut self) {
        info!("Portal: starting");
        match self.platform_portal() {
            Ok(body) => {
                self.accept_form(&body);
                info!("Portal: settings received");
            }
            Err(e) => warn!("Portal: {}", e),
        }
    }
}
