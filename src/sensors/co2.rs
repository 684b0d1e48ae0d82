//! MH-Z19 NDIR CO2 sensor.
//!
//! The chip's own erroneous-reading filter is enabled in `begin`; while
//! it rejects a measurement the driver reports 0 ppm, which is treated as
//! "no data" and not published.  A concentration at or above the
//! configurable alarm level is surfaced through [`Sensor::alarm`].

use log::warn;

use super::{Alarm, FetchStatus, Reading, ReadingSink, Sample, Sensor, emit_sample};
use crate::app::ports::{Clock, Settings};
use crate::drivers::Co2Driver;
use crate::error::SensorError;

pub const ID: &str = "MH-Z19";

/// Settings key for the alarm level in ppm.  `0` disables the alarm.
pub const ALARM_KEY: &str = "MH-Z19_alarm";
pub const ALARM_DEFAULT_PPM: i32 = 800;
pub const ALARM_MAX_PPM: i32 = 5000;

pub fn classify(ppm: i32) -> Sample<i32> {
    match ppm {
        0 => Sample::NoData,
        p if p < 0 => Sample::Invalid,
        p => Sample::Value(p),
    }
}

pub struct Mhz19<D> {
    driver: D,
    alarm_level: i32,
    last_ppm: Option<i32>,
}

impl<D: Co2Driver> Mhz19<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            alarm_level: ALARM_DEFAULT_PPM,
            last_ppm: None,
        }
    }

    pub fn alarm_level(&self) -> i32 {
        self.alarm_level
    }
}

impl<D: Co2Driver> Sensor for Mhz19<D> {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "CO2 sensor"
    }

    fn default_topic(&self) -> &'static str {
        "co2"
    }

    fn configure(&mut self, settings: &dyn Settings) {
        self.alarm_level = settings.integer(ALARM_KEY, 0, ALARM_MAX_PPM, ALARM_DEFAULT_PPM);
    }

    fn init(&mut self) -> Result<(), SensorError> {
        self.driver.begin()
    }

    fn fetch(&mut self, _clock: &dyn Clock, out: &mut dyn ReadingSink) -> FetchStatus {
        let raw = self.driver.read_ppm();
        let sample = classify(raw);
        self.last_ppm = match sample {
            Sample::Value(ppm) => Some(ppm),
            Sample::Invalid => {
                warn!("{}: invalid reading {}", ID, raw);
                None
            }
            Sample::NoData => None,
        };
        emit_sample(sample.map(|ppm| Reading::new(ppm.to_string(), "PPM")), out)
    }

    fn alarm(&self) -> Option<Alarm> {
        if self.alarm_level <= 0 {
            return None;
        }
        self.last_ppm
            .filter(|&ppm| ppm >= self.alarm_level)
            .map(|ppm| Alarm {
                value: ppm as f32,
                threshold: self.alarm_level as f32,
            })
    }
}
