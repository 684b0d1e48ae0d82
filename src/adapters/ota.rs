//! Remote firmware update adapter.
//!
//! Implements [`UpdatePort`].  The image transfer itself is handled by the
//! ESP-IDF OTA listener; what the poll loop owes it is a call per cycle.
//! On the first of those calls the running image is marked valid, which
//! cancels the bootloader's pending rollback: an image that reaches the
//! poll loop is considered good.

use log::{debug, info, warn};

use crate::app::ports::UpdatePort;

pub struct OtaAdapter {
    enabled: bool,
    validated: bool,
    services: u32,
}

impl OtaAdapter {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            info!("OTA: remote updates enabled");
        }
        Self {
            enabled,
            validated: false,
            services: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the running image has been confirmed to the bootloader.
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn services(&self) -> u32 {
        self.services
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn mark_valid(&mut self) {
        match esp_ota::mark_app_valid() {
            Ok(()) => {
                info!("OTA: firmware marked valid (rollback cancelled)");
                self.validated = true;
            }
            Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
        }
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn mark_valid(&mut self) {
        if self.services == 0 {
            warn!("OTA: rollback check skipped (simulation)");
        }
        self.validated = true;
    }
}

impl UpdatePort for OtaAdapter {
    fn service(&mut self) {
        if !self.enabled {
            return;
        }
        if !self.validated {
            self.mark_valid();
        }
        self.services += 1;
        debug!("OTA: serviced ({})", self.services);
    }
}
