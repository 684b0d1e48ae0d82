//! ESP32 time adapter.
//!
//! Implements [`Clock`] for the poll loop.
//!
//! - **ESP-IDF (`espidf` feature)**: `esp_timer_get_time()` (monotonic,
//!   microsecond resolution) and a FreeRTOS delay for `pause_ms`, which
//!   lets the idle task and the WiFi/MQTT tasks run.
//! - **Host and featureless builds**: `std::time::Instant` and
//!   `thread::sleep` for host-side simulation.

use crate::app::ports::Clock;

pub struct Esp32TimeAdapter {
    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
            start: std::time::Instant::now(),
        }
    }

    /// Seconds since boot (monotonic).
    pub fn uptime_secs(&self) -> u64 {
        self.now_ms() / 1000
    }
}

impl Clock for Esp32TimeAdapter {
    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn now_ms(&self) -> u64 {
        (unsafe { esp_idf_sys::esp_timer_get_time() }) as u64 / 1000
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    #[cfg(all(target_os = "espidf", feature = "espidf"))]
    fn pause_ms(&self, ms: u64) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms.min(u64::from(u32::MAX)) as u32);
    }

    #[cfg(not(all(target_os = "espidf", feature = "espidf")))]
    fn pause_ms(&self, ms: u64) {
        std::thread::sleep(std::time::Duration::from_millis(ms));
    }
}
