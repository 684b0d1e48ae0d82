//! GPIO / peripheral pin assignments for the Snuffelaar node board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// User button (active-low with external pull-up)
// ---------------------------------------------------------------------------

/// Momentary push-button that opens the configuration portal.
pub const BUTTON_GPIO: i32 = 15;

// ---------------------------------------------------------------------------
// I²C bus (BME280)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 23;
pub const I2C_SCL_GPIO: i32 = 13;
/// BME280 with SDO tied low.
pub const BME280_I2C_ADDR: u8 = 0x76;

// ---------------------------------------------------------------------------
// 1-Wire bus (DS18B20 probes)
// ---------------------------------------------------------------------------

pub const ONE_WIRE_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// UARTs
// ---------------------------------------------------------------------------

/// MH-Z19 CO2 sensor, 9600 baud.
pub const MHZ19_RX_GPIO: i32 = 22;
pub const MHZ19_TX_GPIO: i32 = 21;

/// PMS7003 particulate sensor, 9600 baud, passive mode.
pub const PMS7003_RX_GPIO: i32 = 25;
pub const PMS7003_TX_GPIO: i32 = 32;

pub const SENSOR_UART_BAUD: u32 = 9_600;
