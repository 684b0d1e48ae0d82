//! PMS7003 particulate matter sensor, passive mode.
//!
//! `prepare` requests a frame; `fetch` collects it and emits three
//! readings, one per particle size, with `{size}` substituted by
//! `1.0`, `2.5` and `10.0`.

use super::{FetchStatus, Reading, ReadingSink, Sensor};
use crate::app::ports::Clock;
use crate::drivers::{ParticulateDriver, PmFrame};
use crate::error::SensorError;
use crate::topic::Substitution;

pub const ID: &str = "PMS7003";

const UNIT: &str = "µg/m3";

fn sizes(frame: PmFrame) -> [(&'static str, u16); 3] {
    [
        ("1.0", frame.pm1_0),
        ("2.5", frame.pm2_5),
        ("10.0", frame.pm10_0),
    ]
}

pub struct Pms7003<D> {
    driver: D,
}

impl<D: ParticulateDriver> Pms7003<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }
}

impl<D: ParticulateDriver> Sensor for Pms7003<D> {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "particulate matter sensor"
    }

    fn default_topic(&self) -> &'static str {
        "dust-PM{size}"
    }

    fn init(&mut self) -> Result<(), SensorError> {
        self.driver.begin()
    }

    fn prepare(&mut self) {
        self.driver.request_read();
    }

    fn fetch(&mut self, _clock: &dyn Clock, out: &mut dyn ReadingSink) -> FetchStatus {
        let Some(frame) = self.driver.read_frame() else {
            return FetchStatus::NoData;
        };
        for (size, value) in sizes(frame) {
            out.emit(Reading::with(
                vec![Substitution::new("{size}", size)],
                value.to_string(),
                UNIT,
            ));
        }
        FetchStatus::Complete
    }
}
