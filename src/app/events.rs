//! Outbound application events.
//!
//! The node service and poll scheduler emit these through the
//! [`EventSink`](super::ports::EventSink) port.  The log adapter turns
//! them into serial console lines; tests record them.

use crate::lifecycle::NodeState;

/// Structured events emitted by the node core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The lifecycle moved between states.
    StateChanged { from: NodeState, to: NodeState },

    /// A message is about to be handed to the broker.  Always emitted
    /// before transmission, whether or not the broker is reachable.
    Publishing { topic: String, payload: String },

    /// The broker was disconnected at cycle start; one reconnect was tried.
    BrokerReconnect { success: bool },

    /// A sensor-side threshold was crossed.  Local only, never published.
    Alarm {
        sensor: &'static str,
        value: f32,
        threshold: f32,
    },

    /// A descriptor's init failed; it is excluded from polling.
    SensorFaulted { sensor: &'static str },

    /// One poll cycle finished.
    CycleCompleted(CycleSummary),
}

/// Counters for one finished poll cycle, suitable for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleSummary {
    pub cycle: u64,
    pub published: u32,
    pub publish_failures: u32,
    pub no_data: u32,
    pub truncated: u32,
    pub elapsed_ms: u64,
}
