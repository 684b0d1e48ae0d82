//! Driver seams for the sensor chips, plus the portal button.
//!
//! The bus protocols and vendor register maps (1-Wire for the DS18B20,
//! UART for the MH-Z19 and PMS7003, I2C for the BME280) live behind the
//! traits below.  Drivers report raw numbers exactly as the chips do,
//! sentinels included; classifying those into a
//! [`Sample`](crate::sensors::Sample) is the sensor layer's job.
//!
//! `esp` implements the traits over ESP-IDF buses on the device.
//! [`pms_frame`] is the PMS7003 wire codec it uses, kept host-side so it
//! is tested like everything else.  Every other build gets [`sim`], the
//! in-memory implementations used by host tests.

pub mod button;
#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub mod esp;
pub mod pms_frame;
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub mod sim;

use crate::error::SensorError;

/// Value a DS18B20 driver returns for an index with no probe behind it.
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

/// DS18B20 power-on reset value, returned when a conversion never ran
/// (brown-out, bad wiring).  Never a real reading in this deployment.
pub const POWER_ON_RESET_C: f32 = 85.0;

/// 1-Wire bus with zero or more DS18B20 probes.
pub trait TemperatureBus {
    fn begin(&mut self) -> Result<(), SensorError>;

    /// Start a conversion on every probe without waiting for it.
    fn request_conversions(&mut self);

    fn conversion_complete(&mut self) -> bool;

    /// Probes found during the last bus search.
    fn probe_count(&mut self) -> usize;

    /// Last converted temperature of probe `index`, in °C.
    /// [`DEVICE_DISCONNECTED_C`] when no probe answers at that index.
    fn temperature_c(&mut self, index: usize) -> f32;
}

/// MH-Z19 CO2 sensor on a UART.
pub trait Co2Driver {
    /// Open the UART and enable automatic baseline calibration.
    fn begin(&mut self) -> Result<(), SensorError>;

    /// CO2 concentration in ppm.  `0` for a reading the driver rejected.
    fn read_ppm(&mut self) -> i32;
}

/// One PMS7003 data frame, atmospheric-environment concentrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PmFrame {
    pub pm1_0: u16,
    pub pm2_5: u16,
    pub pm10_0: u16,
}

/// PMS7003 particulate sensor on a UART, passive mode.
pub trait ParticulateDriver {
    /// Open the UART and switch the sensor to passive mode.
    fn begin(&mut self) -> Result<(), SensorError>;

    /// Ask for one frame (passive mode request).
    fn request_read(&mut self);

    /// Collect the requested frame; `None` if none arrived in time.
    fn read_frame(&mut self) -> Option<PmFrame>;
}

/// BME280 humidity / pressure sensor on I2C.
///
/// Repeated `begin` calls on the same chip are harmless, which is what
/// lets the humidity and pressure descriptors each own a handle.
pub trait ClimateDriver {
    fn begin(&mut self) -> Result<(), SensorError>;

    /// Relative humidity in percent; NaN if the chip did not answer.
    fn humidity_percent(&mut self) -> f32;

    /// Barometric pressure in pascal; NaN if the chip did not answer.
    fn pressure_pa(&mut self) -> f32;
}
