//! Poll cycle engine.
//!
//! One call to [`PollScheduler::run_cycle`] is one Polling cycle:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ t0 = clock.now_ms()                                          │
//! │                                                              │
//! │ 1. updates.service()            remote update, non-blocking  │
//! │ 2. broker reconnect             once, only if disconnected   │
//! │ 3. prepare pass                 every Ready descriptor       │
//! │ 4. fetch pass ──▶ topic ──▶ Publisher ──▶ EventSink, Broker  │
//! │ 5.   └─ alarm after each fetch ──▶ EventSink                 │
//! │ 6. wait until t0 + interval     button checked every step    │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The interval is a lower bound on the cycle period, not a precise
//! cadence: a slow fetch pass stretches the cycle, it never shortens the
//! next one.

use log::{debug, info};

use crate::app::events::{AppEvent, CycleSummary};
use crate::app::ports::{BrokerPort, Clock, EventSink, PortalTrigger, UpdatePort};
use crate::publisher::Publisher;
use crate::sensors::registry::{FetchOutput, SensorRegistry};

/// Granularity of the inter-cycle wait, and so of the button check.
pub const WAIT_STEP_MS: u64 = 50;

/// Everything a cycle talks to besides the registry and publisher.
pub struct CycleIo<'a> {
    pub clock: &'a dyn Clock,
    pub broker: &'a mut dyn BrokerPort,
    pub updates: &'a mut dyn UpdatePort,
    pub trigger: &'a mut dyn PortalTrigger,
    pub sink: &'a mut dyn EventSink,
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleReport {
    pub cycle: u64,
    pub published: u32,
    pub publish_failures: u32,
    pub no_data: u32,
    pub truncated: u32,
    pub reconnect_attempted: bool,
    /// The portal button fired during the wait; the wait was cut short.
    pub portal_requested: bool,
    pub elapsed_ms: u64,
}

impl CycleReport {
    pub fn summary(&self) -> CycleSummary {
        CycleSummary {
            cycle: self.cycle,
            published: self.published,
            publish_failures: self.publish_failures,
            no_data: self.no_data,
            truncated: self.truncated,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

pub struct PollScheduler {
    interval_ms: u64,
    cycles: u64,
}

impl PollScheduler {
    pub fn new(interval_ms: u64) -> Self {
        info!("Scheduler: polling every {}ms", interval_ms);
        Self {
            interval_ms,
            cycles: 0,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Cycles run so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn run_cycle(
        &mut self,
        registry: &mut SensorRegistry,
        publisher: &Publisher,
        io: &mut CycleIo<'_>,
    ) -> CycleReport {
        let started = io.clock.now_ms();
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            ..CycleReport::default()
        };

        io.updates.service();

        if !io.broker.is_connected() {
            report.reconnect_attempted = true;
            let success = io.broker.connect().is_ok();
            io.sink.emit(&AppEvent::BrokerReconnect { success });
        }

        registry.prepare_enabled(io.clock);

        let (mut published, mut failures) = (0u32, 0u32);
        let tally = {
            let broker = &mut *io.broker;
            let sink = &mut *io.sink;
            registry.fetch_enabled(io.clock, &mut |out: FetchOutput<'_>| match out {
                FetchOutput::Reading { pattern, reading } => {
                    match publisher.publish(pattern, &reading, broker, sink) {
                        Ok(()) => published += 1,
                        Err(_) => failures += 1,
                    }
                }
                FetchOutput::Alarm { sensor, alarm } => sink.emit(&AppEvent::Alarm {
                    sensor,
                    value: alarm.value,
                    threshold: alarm.threshold,
                }),
            })
        };
        report.published = published;
        report.publish_failures = failures;
        report.no_data = tally.no_data;
        report.truncated = tally.truncated;

        report.portal_requested = self.wait_until(started + self.interval_ms, io);
        report.elapsed_ms = io.clock.now_ms().saturating_sub(started);

        debug!(
            "Scheduler: cycle {} done in {}ms ({} published, {} failed)",
            report.cycle, report.elapsed_ms, report.published, report.publish_failures
        );
        io.sink.emit(&AppEvent::CycleCompleted(report.summary()));
        report
    }

    /// Pause until `deadline`, checking the portal trigger between steps.
    /// Returns `true` if the trigger fired.
    fn wait_until(&self, deadline: u64, io: &mut CycleIo<'_>) -> bool {
        loop {
            if io.trigger.triggered(io.clock) {
                return true;
            }
            let now = io.clock.now_ms();
            if now >= deadline {
                return false;
            }
            io.clock.pause_ms(WAIT_STEP_MS.min(deadline - now));
        }
    }
}
