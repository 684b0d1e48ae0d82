//! DS18B20 temperature probes on a shared 1-Wire bus.
//!
//! One descriptor covers every probe on the bus.  `prepare` starts a
//! conversion on all of them at once, so the ~750 ms conversion overlaps
//! with the other sensors' prepare/fetch work.  `fetch` then waits at
//! most [`CONVERSION_TIMEOUT_MS`] for the conversion to finish and reads
//! each probe, emitting one reading per probe with `{index}` substituted.
//!
//! If the timeout elapses the probes are read anyway; a late conversion
//! yields the previous cycle's value (or the power-on value, which is
//! filtered below).

use log::debug;

use super::{FetchStatus, Reading, ReadingSink, Sample, Sensor, format_decimal};
use crate::app::ports::Clock;
use crate::drivers::{DEVICE_DISCONNECTED_C, POWER_ON_RESET_C, TemperatureBus};
use crate::error::SensorError;
use crate::topic::Substitution;

pub const ID: &str = "DS18B20";

/// Upper bound on the conversion wait inside `fetch`.
pub const CONVERSION_TIMEOUT_MS: u64 = 500;
/// Interval between `conversion_complete` polls while waiting.
const CONVERSION_POLL_MS: u64 = 5;
/// Hard cap on probes enumerated per cycle.
pub const MAX_PROBES: usize = 100;

/// Classify a raw probe value.
#[allow(clippy::float_cmp)] // sentinels are exact values set by the driver
pub fn classify(celsius: f32) -> Sample<f32> {
    if celsius.is_nan() || celsius == DEVICE_DISCONNECTED_C || celsius == POWER_ON_RESET_C {
        Sample::Invalid
    } else {
        Sample::Value(celsius)
    }
}

pub struct Ds18b20<B> {
    bus: B,
}

impl<B: TemperatureBus> Ds18b20<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    fn wait_for_conversion(&mut self, clock: &dyn Clock) {
        let deadline = clock.now_ms() + CONVERSION_TIMEOUT_MS;
        while !self.bus.conversion_complete() {
            if clock.now_ms() >= deadline {
                debug!(
                    "{}: conversion not complete after {}ms, reading anyway",
                    ID, CONVERSION_TIMEOUT_MS
                );
                return;
            }
            clock.pause_ms(CONVERSION_POLL_MS);
        }
    }

    /// Probes the bus claims to have.  Only used to tell a natural end of
    /// enumeration from one cut short by a bad probe.
    fn expected_probes(&mut self) -> usize {
        self.bus.probe_count().min(MAX_PROBES)
    }
}

impl<B: TemperatureBus> Sensor for Ds18b20<B> {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "temperature sensor(s)"
    }

    fn default_topic(&self) -> &'static str {
        "temperature/{index}"
    }

    fn init(&mut self) -> Result<(), SensorError> {
        self.bus.begin()
    }

    fn prepare(&mut self) {
        self.bus.request_conversions();
    }

    fn fetch(&mut self, clock: &dyn Clock, out: &mut dyn ReadingSink) -> FetchStatus {
        self.wait_for_conversion(clock);

        let mut emitted = 0;
        for index in 0..MAX_PROBES {
            match classify(self.bus.temperature_c(index)) {
                Sample::Value(c) => {
                    out.emit(Reading::with(
                        vec![Substitution::new("{index}", index.to_string())],
                        format_decimal(c),
                        "°C",
                    ));
                    emitted += 1;
                }
                // Past the last probe the driver reports "disconnected",
                // so this is also how a healthy enumeration ends.
                Sample::Invalid | Sample::NoData => break,
            }
        }

        if emitted == 0 {
            FetchStatus::NoData
        } else if emitted < self.expected_probes() {
            FetchStatus::Truncated
        } else {
            FetchStatus::Complete
        }
    }
}
