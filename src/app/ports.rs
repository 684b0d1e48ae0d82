//! Port traits: the hexagonal boundary between the node core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService / PollScheduler (domain)
//! ```
//!
//! Every external collaborator (broker transport, WiFi and the
//! provisioning portal, OTA, config persistence, the monotonic clock) is
//! reached only through these traits, so the poll loop is fully testable
//! on the host with mock adapters.
//!
//! All ports are used from the single cooperative main context; none of
//! them require `Send` or `Sync`.

use crate::config::NodeConfig;
use crate::error::CommsError;

// ───────────────────────────────────────────────────────────────
// Clock port (monotonic time + cooperative yield)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock with a cooperative pause.
///
/// Every wait in the firmware (DS18B20 conversion, inter-cycle pacing,
/// button debounce, WiFi association) is a deadline check against
/// [`now_ms`](Clock::now_ms) interleaved with [`pause_ms`](Clock::pause_ms).
pub trait Clock {
    /// Milliseconds since boot.  Never decreases.
    fn now_ms(&self) -> u64;

    /// Yield for roughly `ms` milliseconds.
    fn pause_ms(&self, ms: u64);
}

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: domain → MQTT)
// ───────────────────────────────────────────────────────────────

/// Black-box publish primitive.
pub trait BrokerPort {
    fn is_connected(&self) -> bool;

    /// One blocking connect attempt.  Callers ignore failure and retry on
    /// the next cycle.
    fn connect(&mut self) -> Result<(), CommsError>;

    /// Publish with `retain = true` at the default (at-most-once) tier.
    fn publish_retained(&mut self, topic: &str, payload: &str) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Remote update port
// ───────────────────────────────────────────────────────────────

/// Cooperative, non-blocking servicing of the remote firmware update
/// listener.  Called once at the start of every poll cycle.
pub trait UpdatePort {
    fn service(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Portal trigger (physical button)
// ───────────────────────────────────────────────────────────────

/// Checked while waiting (between cycles and during Connecting).
/// Returns `true` once a debounced press asks for the portal.
pub trait PortalTrigger {
    fn triggered(&mut self, clock: &dyn Clock) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Connectivity + provisioning (external collaborators)
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConnectivityPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// No credentials have been provisioned yet.
    NoCredentials,
    /// The radio refused to start association.
    StartFailed,
}

impl core::fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::StartFailed => write!(f, "WiFi start failed"),
        }
    }
}

/// Network link used by the Connecting state.
pub trait ConnectivityPort {
    /// Kick off association.  Returns immediately; poll
    /// [`is_connected`](ConnectivityPort::is_connected) for the outcome.
    fn begin(&mut self) -> Result<(), ConnectivityError>;

    fn is_connected(&self) -> bool;
}

/// The configuration portal.  Blocks until the user leaves it.
pub trait ProvisioningPort {
    fn run_portal(&mut self);
}

/// The station link and the portal share one radio, so Connecting needs
/// both from the same adapter.
pub trait NetworkPort: ConnectivityPort + ProvisioningPort {}

impl<T: ConnectivityPort + ProvisioningPort> NetworkPort for T {}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ConfigError::NotFound`] on first boot.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

/// Read-only view of descriptor-specific tunables, handed to
/// [`Sensor::configure`](crate::sensors::Sensor::configure).
pub trait Settings {
    /// Integer tunable in `min..=max`; `default` when absent or out of
    /// range.
    fn integer(&self, key: &str, min: i32, max: i32, default: i32) -> i32;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → diagnostic log)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  The log adapter writes them to the serial console.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
