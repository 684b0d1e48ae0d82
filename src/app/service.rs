//! Node service: the hexagonal core.
//!
//! [`NodeService`] owns the sensor registry, lifecycle, publisher and
//! poll scheduler, and walks the node through its states.  All I/O flows
//! through port traits passed in at each call, so the whole service runs
//! on the host against mock adapters.
//!
//! ```text
//!  ConnectivityPort ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  ProvisioningPort ──▶ │       NodeService        │ ──▶ BrokerPort
//!     PortalTrigger ──▶ │ Lifecycle · Registry ·   │
//!        UpdatePort ──▶ │ Publisher · Scheduler    │
//!                       └──────────────────────────┘
//! ```
//!
//! `main` drives it in order: [`configure`](NodeService::configure),
//! [`connect`](NodeService::connect), [`initialize`](NodeService::initialize),
//! then [`poll_once`](NodeService::poll_once) forever.  When a cycle
//! reports a portal request the node sits in Portal until `main` calls
//! [`run_portal`](NodeService::run_portal), and then reconnects.

use log::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::{CommsError, Error, Result};
use crate::lifecycle::{Lifecycle, NodeState};
use crate::publisher::Publisher;
use crate::scheduler::{CycleIo, CycleReport, PollScheduler};
use crate::sensors::registry::SensorRegistry;

use super::events::AppEvent;
use super::ports::{Clock, ConnectivityError, EventSink, NetworkPort, PortalTrigger, ProvisioningPort};

/// Poll period of the association wait in Connecting.
pub const CONNECT_POLL_MS: u64 = 50;

pub struct NodeService {
    registry: SensorRegistry,
    lifecycle: Lifecycle,
    publisher: Publisher,
    scheduler: PollScheduler,
    connect_timeout_ms: u64,
}

impl NodeService {
    /// Wrap an already-populated registry.  Starts in Booting with the
    /// default configuration until [`configure`](Self::configure) runs.
    pub fn new(registry: SensorRegistry) -> Self {
        let defaults = NodeConfig::default();
        Self {
            registry,
            lifecycle: Lifecycle::new(),
            publisher: Publisher::from_config(&defaults),
            scheduler: PollScheduler::new(defaults.interval_ms()),
            connect_timeout_ms: u64::from(defaults.connect_timeout_ms),
        }
    }

    pub fn state(&self) -> NodeState {
        self.lifecycle.current()
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    // ── Configuring ───────────────────────────────────────────

    /// Apply `config`: per-descriptor overrides, descriptor tunables,
    /// publisher and scheduler settings.  The config is copied in; later
    /// changes take effect on the next boot.
    pub fn configure(&mut self, config: &NodeConfig, sink: &mut dyn EventSink) -> Result<()> {
        self.transition(NodeState::Configuring, sink)?;
        config.validate().map_err(|e| {
            warn!("Node: rejecting config: {}", e);
            Error::Config("invalid configuration")
        })?;

        for key in config.sensors.keys() {
            if self.registry.get(key).is_none() {
                warn!("Node: settings for unknown sensor '{}' ignored", key);
            }
        }

        let ids: Vec<&'static str> = self.registry.iter().map(|d| d.id()).collect();
        for id in ids {
            let settings = config.sensor(id);
            if let Some(d) = self.registry.get_mut(id) {
                d.set_enabled(settings.enabled)?;
                if let Some(topic) = settings.topic {
                    d.set_topic(topic)?;
                }
                info!(
                    "Node: {} {} -> '{}'",
                    id,
                    if d.enabled() { "enabled" } else { "disabled" },
                    d.topic()
                );
            }
        }
        self.registry.configure_all(config);

        self.publisher = Publisher::from_config(config);
        self.scheduler = PollScheduler::new(config.interval_ms());
        self.connect_timeout_ms = u64::from(config.connect_timeout_ms);

        if let Ok(json) = serde_json::to_string(config) {
            debug!("Node: config {}", json);
        }
        Ok(())
    }

    // ── Connecting ────────────────────────────────────────────

    /// Bring the network link up, waiting at most the connect timeout.
    ///
    /// A debounced button press at any point diverts to the portal; the
    /// wait starts over once the portal returns.  Missing credentials
    /// also open the portal.  A timeout is fatal: the caller restarts.
    pub fn connect(
        &mut self,
        net: &mut dyn NetworkPort,
        trigger: &mut dyn PortalTrigger,
        clock: &dyn Clock,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        if self.state() != NodeState::Connecting {
            self.transition(NodeState::Connecting, sink)?;
        }

        'attempt: loop {
            match net.begin() {
                Ok(()) => {}
                Err(ConnectivityError::NoCredentials) => {
                    info!("Node: no WiFi credentials, opening portal");
                    self.divert_to_portal(net, sink)?;
                    continue 'attempt;
                }
                Err(e @ ConnectivityError::StartFailed) => {
                    warn!("Node: {}", e);
                    return Err(CommsError::WifiConnectFailed.into());
                }
            }

            let deadline = clock.now_ms() + self.connect_timeout_ms;
            while !net.is_connected() {
                if trigger.triggered(clock) {
                    self.divert_to_portal(net, sink)?;
                    continue 'attempt;
                }
                if clock.now_ms() >= deadline {
                    warn!(
                        "Node: WiFi not associated after {}ms",
                        self.connect_timeout_ms
                    );
                    return Err(CommsError::WifiConnectFailed.into());
                }
                clock.pause_ms(CONNECT_POLL_MS);
            }
            info!("Node: WiFi connected");
            return Ok(());
        }
    }

    fn divert_to_portal(&mut self, net: &mut dyn NetworkPort, sink: &mut dyn EventSink) -> Result<()> {
        self.transition(NodeState::Portal, sink)?;
        net.run_portal();
        self.transition(NodeState::Connecting, sink)
    }

    // ── Initializing ──────────────────────────────────────────

    /// Run `init` once on every enabled descriptor, then enter Polling.
    /// Descriptors initialised on an earlier pass are left alone.
    pub fn initialize(&mut self, clock: &dyn Clock, sink: &mut dyn EventSink) -> Result<()> {
        self.transition(NodeState::Initializing, sink)?;
        let tally = self.registry.init_enabled(clock);
        for sensor in tally.faulted {
            sink.emit(&AppEvent::SensorFaulted { sensor });
        }
        if tally.visited > 0 {
            info!("Node: {} sensor(s) initialised", tally.visited);
        }
        self.transition(NodeState::Polling, sink)
    }

    // ── Polling ───────────────────────────────────────────────

    /// Run one poll cycle.  Moves to Portal if the button fired during
    /// the inter-cycle wait.
    pub fn poll_once(&mut self, io: &mut CycleIo<'_>) -> Result<CycleReport> {
        if self.state() != NodeState::Polling {
            return Err(Error::Lifecycle {
                from: self.state(),
                to: NodeState::Polling,
            });
        }
        let report = self
            .scheduler
            .run_cycle(&mut self.registry, &self.publisher, io);
        if report.portal_requested {
            self.transition(NodeState::Portal, io.sink)?;
        }
        Ok(report)
    }

    // ── Portal ────────────────────────────────────────────────

    /// Hand control to the provisioning portal, then go back to
    /// Connecting.
    pub fn run_portal(
        &mut self,
        portal: &mut dyn ProvisioningPort,
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        if self.state() != NodeState::Portal {
            return Err(Error::Lifecycle {
                from: self.state(),
                to: NodeState::Portal,
            });
        }
        portal.run_portal();
        self.transition(NodeState::Connecting, sink)
    }

    fn transition(&mut self, to: NodeState, sink: &mut dyn EventSink) -> Result<()> {
        let from = self.lifecycle.advance(to)?;
        sink.emit(&AppEvent::StateChanged { from, to });
        Ok(())
    }
}
