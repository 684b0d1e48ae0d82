//! Sensor subsystem: the [`Sensor`] trait, concrete sensor kinds, and
//! the ordered [`registry::SensorRegistry`] that drives them.
//!
//! Each physical sensor kind is one type implementing [`Sensor`] and
//! exclusively owning its driver handle (see [`crate::drivers`]).  The
//! registry wraps each one in a descriptor carrying the enabled flag and
//! topic pattern, and runs the lifecycle operations in registration order:
//!
//! ```text
//!  configure ─▶ init ─▶ { prepare pass ─▶ fetch pass } × ∞
//! ```
//!
//! Sensors never signal "nothing to report" with in-band values.  Driver
//! sentinels are classified into a [`Sample`], and `fetch` reports what
//! happened through [`FetchStatus`].

pub mod catalog;
pub mod climate;
pub mod co2;
pub mod dust;
pub mod registry;
pub mod temperature;

use crate::app::ports::{Clock, Settings};
use crate::error::SensorError;
use crate::topic::Substitution;

/// A single measurement ready for templating and publishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    /// Value rendered as text.
    pub value: String,
    /// Unit of measurement (`°C`, `PPM`, ...).  May be empty.
    pub unit: &'static str,
    /// Placeholder substitutions specific to this reading.
    pub substitutions: Vec<Substitution>,
}

impl Reading {
    pub fn new(value: impl Into<String>, unit: &'static str) -> Self {
        Self {
            value: value.into(),
            unit,
            substitutions: Vec::new(),
        }
    }

    pub fn with(
        substitutions: Vec<Substitution>,
        value: impl Into<String>,
        unit: &'static str,
    ) -> Self {
        Self {
            value: value.into(),
            unit,
            substitutions,
        }
    }

    /// Float reading rendered with two decimals (`21.50`).
    pub fn decimal(value: f32, unit: &'static str) -> Self {
        Self::new(format_decimal(value), unit)
    }
}

/// Two-decimal rendering used for every floating-point value.
pub fn format_decimal(value: f32) -> String {
    format!("{value:.2}")
}

/// Explicit outcome of one raw driver read.
///
/// Replaces the in-band sentinels the chips use (`0` ppm while the MH-Z19
/// filter is settling, `-127 °C` for a missing DS18B20, ...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample<T> {
    /// A legitimate measurement, including a legitimate zero.
    Value(T),
    /// Nothing available yet.  Skip silently.
    NoData,
    /// The device reported itself disconnected or invalid.
    Invalid,
}

impl<T> Sample<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sample<U> {
        match self {
            Sample::Value(v) => Sample::Value(f(v)),
            Sample::NoData => Sample::NoData,
            Sample::Invalid => Sample::Invalid,
        }
    }
}

/// Emit a single-reading sample.  An invalid sample counts as an
/// enumeration of one that ended before its first reading.
pub(crate) fn emit_sample(sample: Sample<Reading>, out: &mut dyn ReadingSink) -> FetchStatus {
    match sample {
        Sample::Value(reading) => {
            out.emit(reading);
            FetchStatus::Complete
        }
        Sample::NoData => FetchStatus::NoData,
        Sample::Invalid => FetchStatus::Truncated,
    }
}

/// What a single `fetch` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Every reading the sensor had was emitted.
    Complete,
    /// The sensor had nothing this cycle; zero readings were emitted.
    NoData,
    /// An invalid sample ended a multi-reading enumeration early.
    /// Readings emitted before it stand.
    Truncated,
}

/// Threshold crossing reported by [`Sensor::alarm`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alarm {
    pub value: f32,
    pub threshold: f32,
}

/// Receives readings as `fetch` produces them.  The registry's sink
/// templates and publishes each one immediately.
pub trait ReadingSink {
    fn emit(&mut self, reading: Reading);
}

impl ReadingSink for Vec<Reading> {
    fn emit(&mut self, reading: Reading) {
        self.push(reading);
    }
}

/// One physical sensor kind.
///
/// Only [`fetch`](Sensor::fetch) is required; the other lifecycle
/// operations default to no-ops, and the registry treats them as such.
pub trait Sensor {
    /// Unique, stable identifier (also the settings key prefix).
    fn id(&self) -> &'static str;

    /// Human description shown in the portal.
    fn description(&self) -> &'static str;

    /// Compiled-in topic pattern, used unless the config overrides it.
    fn default_topic(&self) -> &'static str;

    /// Read descriptor-specific tunables.  Runs once, during Configuring.
    fn configure(&mut self, _settings: &dyn Settings) {}

    /// One-time hardware setup.  Runs once, after connectivity is up.
    fn init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    /// Trigger a measurement without waiting for it.
    fn prepare(&mut self) {}

    /// Emit zero or more readings.  May wait briefly (bounded) for a
    /// conversion started in [`prepare`](Sensor::prepare).
    fn fetch(&mut self, clock: &dyn Clock, out: &mut dyn ReadingSink) -> FetchStatus;

    /// Alarm raised by the most recent fetch, if any.
    fn alarm(&self) -> Option<Alarm> {
        None
    }
}
