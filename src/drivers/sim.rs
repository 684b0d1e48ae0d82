//! In-memory simulation drivers.
//!
//! Each driver is a cheap clonable handle around shared state: keep one
//! clone for injection, hand the other to the sensor.  Everything runs on
//! the single main context, so `Rc<RefCell<_>>` is all the sharing needed.

use std::cell::RefCell;
use std::rc::Rc;

use super::{
    ClimateDriver, Co2Driver, DEVICE_DISCONNECTED_C, ParticulateDriver, PmFrame, TemperatureBus,
};
use crate::error::SensorError;

// ── DS18B20 ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TemperatureState {
    probes: Vec<f32>,
    /// `conversion_complete` polls before the conversion finishes.
    /// `None` = never finishes (exercise the conversion timeout).
    polls_to_complete: Option<u32>,
    polls_left: u32,
    fail_begin: bool,
    begin_calls: u32,
    requests: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SimTemperatureBus {
    state: Rc<RefCell<TemperatureState>>,
}

impl SimTemperatureBus {
    pub fn new(probes: &[f32]) -> Self {
        let bus = Self::default();
        bus.set_probes(probes);
        bus.state.borrow_mut().polls_to_complete = Some(0);
        bus
    }

    pub fn set_probes(&self, probes: &[f32]) {
        self.state.borrow_mut().probes = probes.to_vec();
    }

    /// `Some(n)`: complete after `n` polls.  `None`: never complete.
    pub fn set_conversion_polls(&self, polls: Option<u32>) {
        self.state.borrow_mut().polls_to_complete = polls;
    }

    pub fn fail_begin(&self, fail: bool) {
        self.state.borrow_mut().fail_begin = fail;
    }

    pub fn begin_calls(&self) -> u32 {
        self.state.borrow().begin_calls
    }

    pub fn requests(&self) -> u32 {
        self.state.borrow().requests
    }
}

impl TemperatureBus for SimTemperatureBus {
    fn begin(&mut self) -> Result<(), SensorError> {
        let mut s = self.state.borrow_mut();
        s.begin_calls += 1;
        if s.fail_begin {
            Err(SensorError::NotDetected)
        } else {
            Ok(())
        }
    }

    fn request_conversions(&mut self) {
        let mut s = self.state.borrow_mut();
        s.requests += 1;
        s.polls_left = s.polls_to_complete.unwrap_or(u32::MAX);
    }

    fn conversion_complete(&mut self) -> bool {
        let mut s = self.state.borrow_mut();
        if s.polls_to_complete.is_none() {
            return false;
        }
        if s.polls_left == 0 {
            return true;
        }
        s.polls_left -= 1;
        false
    }

    fn probe_count(&mut self) -> usize {
        self.state.borrow().probes.len()
    }

    fn temperature_c(&mut self, index: usize) -> f32 {
        self.state
            .borrow()
            .probes
            .get(index)
            .copied()
            .unwrap_or(DEVICE_DISCONNECTED_C)
    }
}

// ── MH-Z19 ────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Co2State {
    ppm: i32,
    fail_begin: bool,
    reads: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SimCo2 {
    state: Rc<RefCell<Co2State>>,
}

impl SimCo2 {
    pub fn new(ppm: i32) -> Self {
        let s = Self::default();
        s.set_ppm(ppm);
        s
    }

    pub fn set_ppm(&self, ppm: i32) {
        self.state.borrow_mut().ppm = ppm;
    }

    pub fn fail_begin(&self, fail: bool) {
        self.state.borrow_mut().fail_begin = fail;
    }

    pub fn reads(&self) -> u32 {
        self.state.borrow().reads
    }
}

impl Co2Driver for SimCo2 {
    fn begin(&mut self) -> Result<(), SensorError> {
        if self.state.borrow().fail_begin {
            Err(SensorError::BusUnavailable)
        } else {
            Ok(())
        }
    }

    fn read_ppm(&mut self) -> i32 {
        let mut s = self.state.borrow_mut();
        s.reads += 1;
        s.ppm
    }
}

// ── PMS7003 ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ParticulateState {
    frame: Option<PmFrame>,
    requested: bool,
    requests: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SimParticulate {
    state: Rc<RefCell<ParticulateState>>,
}

impl SimParticulate {
    pub fn new(frame: Option<PmFrame>) -> Self {
        let s = Self::default();
        s.set_frame(frame);
        s
    }

    pub fn set_frame(&self, frame: Option<PmFrame>) {
        self.state.borrow_mut().frame = frame;
    }

    pub fn requests(&self) -> u32 {
        self.state.borrow().requests
    }
}

impl ParticulateDriver for SimParticulate {
    fn begin(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn request_read(&mut self) {
        let mut s = self.state.borrow_mut();
        s.requested = true;
        s.requests += 1;
    }

    fn read_frame(&mut self) -> Option<PmFrame> {
        let mut s = self.state.borrow_mut();
        // Passive mode: no request, no frame.
        if !core::mem::take(&mut s.requested) {
            return None;
        }
        s.frame
    }
}

// ── BME280 ────────────────────────────────────────────────────

#[derive(Debug)]
struct ClimateState {
    humidity: f32,
    pressure_pa: f32,
    begin_calls: u32,
}

impl Default for ClimateState {
    fn default() -> Self {
        Self {
            humidity: f32::NAN,
            pressure_pa: f32::NAN,
            begin_calls: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimClimate {
    state: Rc<RefCell<ClimateState>>,
}

impl SimClimate {
    pub fn new(humidity: f32, pressure_pa: f32) -> Self {
        let s = Self::default();
        s.set(humidity, pressure_pa);
        s
    }

    pub fn set(&self, humidity: f32, pressure_pa: f32) {
        let mut st = self.state.borrow_mut();
        st.humidity = humidity;
        st.pressure_pa = pressure_pa;
    }

    pub fn begin_calls(&self) -> u32 {
        self.state.borrow().begin_calls
    }
}

impl ClimateDriver for SimClimate {
    fn begin(&mut self) -> Result<(), SensorError> {
        self.state.borrow_mut().begin_calls += 1;
        Ok(())
    }

    fn humidity_percent(&mut self) -> f32 {
        self.state.borrow().humidity
    }

    fn pressure_pa(&mut self) -> f32 {
        self.state.borrow().pressure_pa
    }
}
