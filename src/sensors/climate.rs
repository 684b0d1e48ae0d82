//! BME280 humidity and pressure, registered as two independent
//! descriptors so each can be enabled and retopiced on its own.
//! Both hold a handle to the same chip.

use super::{FetchStatus, Reading, ReadingSink, Sample, Sensor, emit_sample};
use crate::app::ports::Clock;
use crate::drivers::ClimateDriver;
use crate::error::SensorError;

pub const HUMIDITY_ID: &str = "BME280_RH";
pub const PRESSURE_ID: &str = "BME280_BP";

fn classify(value: f32) -> Sample<f32> {
    if value.is_finite() {
        Sample::Value(value)
    } else {
        Sample::Invalid
    }
}

pub struct Bme280Humidity<D> {
    driver: D,
}

impl<D: ClimateDriver> Bme280Humidity<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }
}

impl<D: ClimateDriver> Sensor for Bme280Humidity<D> {
    fn id(&self) -> &'static str {
        HUMIDITY_ID
    }

    fn description(&self) -> &'static str {
        "relative humidity sensor"
    }

    fn default_topic(&self) -> &'static str {
        "humidity"
    }

    fn init(&mut self) -> Result<(), SensorError> {
        self.driver.begin()
    }

    fn fetch(&mut self, _clock: &dyn Clock, out: &mut dyn ReadingSink) -> FetchStatus {
        let sample = classify(self.driver.humidity_percent());
        emit_sample(sample.map(|rh| Reading::decimal(rh, "%")), out)
    }
}

pub struct Bme280Pressure<D> {
    driver: D,
}

impl<D: ClimateDriver> Bme280Pressure<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }
}

impl<D: ClimateDriver> Sensor for Bme280Pressure<D> {
    fn id(&self) -> &'static str {
        PRESSURE_ID
    }

    fn description(&self) -> &'static str {
        "barometric pressure sensor"
    }

    fn default_topic(&self) -> &'static str {
        "pressure"
    }

    fn init(&mut self) -> Result<(), SensorError> {
        self.driver.begin()
    }

    fn fetch(&mut self, _clock: &dyn Clock, out: &mut dyn ReadingSink) -> FetchStatus {
        let sample = classify(self.driver.pressure_pa());
        emit_sample(sample.map(|pa| Reading::decimal(pa / 100.0, "hPa")), out)
    }
}
