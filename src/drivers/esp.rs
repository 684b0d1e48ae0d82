//! ESP-IDF drivers for the sensor chips.
//!
//! | Driver                   | Trait              | Bus               | Protocol                  |
//! |--------------------------|--------------------|-------------------|---------------------------|
//! | `OneWireTemperatureBus`  | TemperatureBus     | GPIO, open drain  | `one-wire-bus`, `ds18b20` |
//! | `UartCo2`                | Co2Driver          | UART              | `mh-z19` packets          |
//! | `UartParticulate`        | ParticulateDriver  | UART              | [`pms_frame`]             |
//! | `I2cClimate`             | ClimateDriver      | I2C               | `bme280`                  |
//!
//! Every bus call is blocking and bounded by a short timeout.  Drivers
//! report what the chip said, sentinels included; the sensor layer
//! decides what counts as a reading.

use std::cell::RefCell;
use std::rc::Rc;

use bme280::i2c::BME280;
use ds18b20::Ds18b20;
use esp_idf_hal::delay::{Ets, TickType};
use esp_idf_hal::gpio::{AnyIOPin, InputOutput, PinDriver};
use esp_idf_hal::i2c::I2cDriver;
use esp_idf_hal::uart::UartDriver;
use log::{debug, info, warn};
use one_wire_bus::OneWire;

use super::pms_frame::{self, FrameDecoder};
use super::{
    ClimateDriver, Co2Driver, DEVICE_DISCONNECTED_C, ParticulateDriver, PmFrame, TemperatureBus,
};
use crate::error::SensorError;
use crate::pins;

/// Reply window for one MH-Z19 request.
const MHZ19_REPLY_TIMEOUT_MS: u64 = 200;
/// MH-Z19 "sensor number" byte; always 1 on a point-to-point UART.
const MHZ19_DEVICE: u8 = 1;
/// Window for the PMS7003 to answer a passive-mode request.
const PMS_REPLY_TIMEOUT_MS: u64 = 1_000;

fn ticks(ms: u64) -> u32 {
    TickType::new_millis(ms).into()
}

/// Fill `buf` from `uart`, giving up once a read times out.
fn read_exact(uart: &UartDriver<'_>, buf: &mut [u8], timeout_ms: u64) -> bool {
    let mut filled = 0;
    while filled < buf.len() {
        match uart.read(&mut buf[filled..], ticks(timeout_ms)) {
            Ok(0) | Err(_) => return false,
            Ok(n) => filled += n,
        }
    }
    true
}

// ── DS18B20 ───────────────────────────────────────────────────

type OneWirePin = PinDriver<'static, AnyIOPin, InputOutput>;

pub struct OneWireTemperatureBus {
    bus: OneWire<OneWirePin>,
    probes: Vec<Ds18b20>,
}

impl OneWireTemperatureBus {
    /// `pin` must be configured open drain; the bus needs its external
    /// 4.7 kΩ pull-up.
    pub fn new(pin: OneWirePin) -> Result<Self, SensorError> {
        let bus = OneWire::new(pin).map_err(|e| {
            warn!("DS18B20: 1-Wire bus unusable ({:?})", e);
            SensorError::BusUnavailable
        })?;
        Ok(Self {
            bus,
            probes: Vec::new(),
        })
    }
}

impl TemperatureBus for OneWireTemperatureBus {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.probes.clear();
        for found in self.bus.devices(false, &mut Ets) {
            let address = found.map_err(|e| {
                warn!("DS18B20: bus search failed ({:?})", e);
                SensorError::BusUnavailable
            })?;
            if address.family_code() != ds18b20::FAMILY_CODE {
                continue;
            }
            match Ds18b20::new::<()>(address) {
                Ok(probe) => self.probes.push(probe),
                Err(e) => debug!("DS18B20: skipping {:?} ({:?})", address, e),
            }
        }
        info!(
            "DS18B20: {} probe(s) on GPIO{}",
            self.probes.len(),
            pins::ONE_WIRE_GPIO
        );
        Ok(())
    }

    fn request_conversions(&mut self) {
        if let Err(e) = ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut Ets) {
            debug!("DS18B20: conversion request failed ({:?})", e);
        }
    }

    /// A converting DS18B20 holds read slots low; all ones means done.
    fn conversion_complete(&mut self) -> bool {
        self.bus.read_bit(&mut Ets).unwrap_or(true)
    }

    fn probe_count(&mut self) -> usize {
        self.probes.len()
    }

    fn temperature_c(&mut self, index: usize) -> f32 {
        let Some(probe) = self.probes.get(index) else {
            return DEVICE_DISCONNECTED_C;
        };
        match probe.read_data(&mut self.bus, &mut Ets) {
            Ok(data) => data.temperature,
            Err(e) => {
                debug!("DS18B20: probe {} unreadable ({:?})", index, e);
                DEVICE_DISCONNECTED_C
            }
        }
    }
}

// ── MH-Z19 ────────────────────────────────────────────────────

pub struct UartCo2 {
    uart: UartDriver<'static>,
}

impl UartCo2 {
    /// `uart` must already run at [`SENSOR_UART_BAUD`](pins::SENSOR_UART_BAUD), 8N1.
    pub fn new(uart: UartDriver<'static>) -> Self {
        Self { uart }
    }

    fn request(&mut self, packet: &[u8]) -> Option<[u8; 9]> {
        let _ = self.uart.clear_rx();
        self.uart.write(packet).ok()?;
        let mut reply = [0u8; 9];
        read_exact(&self.uart, &mut reply, MHZ19_REPLY_TIMEOUT_MS).then_some(reply)
    }
}

impl Co2Driver for UartCo2 {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.uart
            .write(&mh_z19::set_automatic_baseline_correction(MHZ19_DEVICE, true))
            .map_err(|_| SensorError::BusUnavailable)?;
        // The chip answers reads from power-up on, even while warming up.
        if self.request(&mh_z19::read_gas_concentration(MHZ19_DEVICE)).is_none() {
            warn!("MH-Z19: no reply on GPIO{}", pins::MHZ19_RX_GPIO);
            return Err(SensorError::NotDetected);
        }
        Ok(())
    }

    /// Replies that fail the checksum or never arrive read as `0`, the
    /// same as a filtered reading.
    fn read_ppm(&mut self) -> i32 {
        let Some(reply) = self.request(&mh_z19::read_gas_concentration(MHZ19_DEVICE)) else {
            debug!("MH-Z19: read timed out");
            return 0;
        };
        match mh_z19::parse_gas_concentration_ppm(&reply) {
            Ok(ppm) => i32::try_from(ppm).unwrap_or(i32::MAX),
            Err(e) => {
                debug!("MH-Z19: rejected reply ({:?})", e);
                0
            }
        }
    }
}

// ── PMS7003 ───────────────────────────────────────────────────

pub struct UartParticulate {
    uart: UartDriver<'static>,
    decoder: FrameDecoder,
}

impl UartParticulate {
    /// `uart` must already run at [`SENSOR_UART_BAUD`](pins::SENSOR_UART_BAUD), 8N1.
    pub fn new(uart: UartDriver<'static>) -> Self {
        Self {
            uart,
            decoder: FrameDecoder::new(),
        }
    }
}

impl ParticulateDriver for UartParticulate {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.uart
            .write(&pms_frame::CMD_PASSIVE_MODE)
            .map_err(|_| SensorError::BusUnavailable)?;
        Ok(())
    }

    fn request_read(&mut self) {
        let _ = self.uart.clear_rx();
        self.decoder.reset();
        if let Err(e) = self.uart.write(&pms_frame::CMD_REQUEST_READ) {
            debug!("PMS7003: request failed ({:?})", e);
        }
    }

    fn read_frame(&mut self) -> Option<PmFrame> {
        let mut byte = [0u8; 1];
        loop {
            match self.uart.read(&mut byte, ticks(PMS_REPLY_TIMEOUT_MS)) {
                Ok(1) => {}
                _ => return None,
            }
            match self.decoder.push(byte[0]) {
                Some(Ok(frame)) => return Some(frame),
                Some(Err(e)) => debug!("PMS7003: dropped frame ({:?})", e),
                None => {}
            }
        }
    }
}

// ── BME280 ────────────────────────────────────────────────────

type Bme280Chip = BME280<I2cDriver<'static>>;

/// Handle to the shared BME280.  Clone it once per descriptor.
#[derive(Clone)]
pub struct I2cClimate {
    chip: Rc<RefCell<Bme280Chip>>,
}

impl I2cClimate {
    pub fn new(i2c: I2cDriver<'static>) -> Self {
        Self {
            chip: Rc::new(RefCell::new(BME280::new(i2c, pins::BME280_I2C_ADDR))),
        }
    }

    /// `(humidity %, pressure Pa)`, or NaN for both if the chip is silent.
    fn measure(&self) -> (f32, f32) {
        match self.chip.borrow_mut().measure(&mut Ets) {
            Ok(m) => (m.humidity, m.pressure),
            Err(e) => {
                debug!("BME280: measurement failed ({:?})", e);
                (f32::NAN, f32::NAN)
            }
        }
    }
}

impl ClimateDriver for I2cClimate {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.chip.borrow_mut().init(&mut Ets).map_err(|e| {
            warn!("BME280: init failed ({:?})", e);
            SensorError::NotDetected
        })
    }

    fn humidity_percent(&mut self) -> f32 {
        self.measure().0
    }

    fn pressure_pa(&mut self) -> f32 {
        self.measure().1
    }
}
