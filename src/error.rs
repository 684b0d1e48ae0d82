//! Unified error types for the Snuffelaar firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the node
//! service and `main` handle failures uniformly.  All variants are `Copy`
//! and carry only static context.
//!
//! Note that "no reading this cycle" is *not* an error: sensors report it
//! through [`FetchStatus`](crate::sensors::FetchStatus) instead.

use core::fmt;

use crate::lifecycle::NodeState;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor driver failed during hardware setup.
    Sensor(SensorError),
    /// A communication subsystem failed.
    Comms(CommsError),
    /// Configuration is invalid or was applied at the wrong time.
    Config(&'static str),
    /// The node lifecycle was asked to make an illegal transition.
    Lifecycle { from: NodeState, to: NodeState },
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Lifecycle { from, to } => {
                write!(f, "lifecycle: illegal transition {from:?} -> {to:?}")
            }
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The chip did not answer on its bus during `begin`.
    NotDetected,
    /// The bus (UART / I2C / 1-Wire) could not be opened.
    BusUnavailable,
    /// The chip answered but rejected the setup sequence.
    SetupRejected,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDetected => write!(f, "sensor not detected"),
            Self::BusUnavailable => write!(f, "bus unavailable"),
            Self::SetupRejected => write!(f, "setup rejected"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// The station never associated within the connect timeout.  Fatal.
    WifiConnectFailed,
    MqttConnectFailed,
    MqttPublishFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WifiConnectFailed => write!(f, "WiFi connect failed"),
            Self::MqttConnectFailed => write!(f, "MQTT connect failed"),
            Self::MqttPublishFailed => write!(f, "MQTT publish failed"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
