//! Compiled-in sensor catalog.
//!
//! Registration order is the publish order, every cycle:
//! DS18B20, MH-Z19, PMS7003, BME280 humidity, BME280 pressure.

use super::climate::{Bme280Humidity, Bme280Pressure};
use super::co2::Mhz19;
use super::dust::Pms7003;
use super::registry::SensorRegistry;
use super::temperature::Ds18b20;
use crate::drivers::{ClimateDriver, Co2Driver, ParticulateDriver, TemperatureBus};
use crate::error::Result;

/// One driver handle per descriptor.  The two BME280 handles talk to the
/// same chip.
pub struct CatalogDrivers<T, C, P, H> {
    pub temperature: T,
    pub co2: C,
    pub particulate: P,
    pub humidity: H,
    pub pressure: H,
}

pub fn register_catalog<T, C, P, H>(
    registry: &mut SensorRegistry,
    drivers: CatalogDrivers<T, C, P, H>,
) -> Result<()>
where
    T: TemperatureBus + 'static,
    C: Co2Driver + 'static,
    P: ParticulateDriver + 'static,
    H: ClimateDriver + 'static,
{
    registry.register(Box::new(Ds18b20::new(drivers.temperature)))?;
    registry.register(Box::new(Mhz19::new(drivers.co2)))?;
    registry.register(Box::new(Pms7003::new(drivers.particulate)))?;
    registry.register(Box::new(Bme280Humidity::new(drivers.humidity)))?;
    registry.register(Box::new(Bme280Pressure::new(drivers.pressure)))?;
    Ok(())
}
