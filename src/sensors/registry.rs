//! Ordered sensor registry.
//!
//! Descriptors are appended once at startup and never removed or
//! reordered, so every pass visits them in registration order.  Each
//! descriptor wraps one [`Sensor`] with the per-node settings the portal
//! controls (enabled flag, topic pattern) and an init state.
//!
//! ```text
//!  Registered ──init Ok──▶ Ready     (prepare + fetch every cycle)
//!       │
//!       └──init Err──▶ Faulted       (skipped for the process lifetime)
//! ```
//!
//! The first init pass freezes every descriptor: `enabled` and `topic`
//! cannot change once hardware setup has been attempted.

use log::{debug, info, warn};

use super::{Alarm, FetchStatus, Reading, ReadingSink, Sensor};
use crate::app::ports::{Clock, Settings};
use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════
//  Descriptor
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    /// Not initialised yet.
    Registered,
    /// `init` succeeded; polled every cycle.
    Ready,
    /// `init` failed.
    Faulted,
}

pub struct Descriptor {
    sensor: Box<dyn Sensor>,
    enabled: bool,
    topic: String,
    state: DescriptorState,
    frozen: bool,
}

impl Descriptor {
    fn new(sensor: Box<dyn Sensor>) -> Self {
        let topic = sensor.default_topic().to_owned();
        Self {
            sensor,
            enabled: true,
            topic,
            state: DescriptorState::Registered,
            frozen: false,
        }
    }

    pub fn id(&self) -> &'static str {
        self.sensor.id()
    }

    pub fn description(&self) -> &'static str {
        self.sensor.description()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> DescriptorState {
        self.state
    }

    pub fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.ensure_mutable()?;
        self.enabled = enabled;
        Ok(())
    }

    pub fn set_topic(&mut self, topic: impl Into<String>) -> Result<()> {
        self.ensure_mutable()?;
        self.topic = topic.into();
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.frozen {
            Err(Error::Config("descriptor frozen after init"))
        } else {
            Ok(())
        }
    }

    fn active(&self) -> bool {
        self.enabled && self.state == DescriptorState::Ready
    }
}

impl core::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Descriptor")
            .field("id", &self.id())
            .field("enabled", &self.enabled)
            .field("topic", &self.topic)
            .field("state", &self.state)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Passes
// ═══════════════════════════════════════════════════════════════

/// Which lifecycle operation a pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Prepare,
    Fetch,
}

/// What one pass over the registry did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseTally {
    /// Descriptors the operation ran on.
    pub visited: u32,
    /// Readings handed to the callback (fetch only).
    pub readings: u32,
    /// Fetches that reported [`FetchStatus::NoData`].
    pub no_data: u32,
    /// Fetches that reported [`FetchStatus::Truncated`].
    pub truncated: u32,
    /// Descriptors whose init failed in this pass.
    pub faulted: Vec<&'static str>,
    /// Alarms raised by the fetches of this pass.
    pub alarms: u32,
}

/// What a fetch pass hands to its caller, as it happens.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutput<'a> {
    /// One reading, with the topic pattern of the descriptor behind it.
    Reading { pattern: &'a str, reading: Reading },
    /// Raised right after the fetch of `sensor` that crossed the level.
    Alarm { sensor: &'static str, alarm: Alarm },
}

/// Forwards each reading to the caller together with the topic pattern
/// of the descriptor that produced it.
struct PatternSink<'a, F> {
    pattern: &'a str,
    on_reading: &'a mut F,
    count: u32,
}

impl<F: FnMut(FetchOutput<'_>)> ReadingSink for PatternSink<'_, F> {
    fn emit(&mut self, reading: Reading) {
        self.count += 1;
        (self.on_reading)(FetchOutput::Reading {
            pattern: self.pattern,
            reading,
        });
    }
}

// ═══════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct SensorRegistry {
    descriptors: Vec<Descriptor>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sensor.  Ids must be unique.
    pub fn register(&mut self, sensor: Box<dyn Sensor>) -> Result<()> {
        if self.get(sensor.id()).is_some() {
            warn!("Registry: duplicate sensor id '{}'", sensor.id());
            return Err(Error::Config("duplicate sensor id"));
        }
        debug!("Registry: registered {} ({})", sensor.id(), sensor.description());
        self.descriptors.push(Descriptor::new(sensor));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.descriptors.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Descriptor> {
        self.descriptors.iter().find(|d| d.id() == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Descriptor> {
        self.descriptors.iter_mut().find(|d| d.id() == id)
    }

    /// Hand the settings to every descriptor, enabled or not.
    pub fn configure_all(&mut self, settings: &dyn Settings) {
        for d in &mut self.descriptors {
            d.sensor.configure(settings);
        }
    }

    /// Run `phase` on every enabled descriptor, in registration order.
    ///
    /// `Init` visits descriptors that have not been initialised yet and
    /// freezes the whole registry.  `Prepare` and `Fetch` visit `Ready`
    /// descriptors only.  Every reading a fetch emits is passed straight
    /// to `on_output` along with the descriptor's topic pattern, and an
    /// alarm follows the fetch that raised it.
    pub fn for_each_enabled<F>(
        &mut self,
        phase: Phase,
        clock: &dyn Clock,
        on_output: &mut F,
    ) -> PhaseTally
    where
        F: FnMut(FetchOutput<'_>),
    {
        let mut tally = PhaseTally::default();
        for d in &mut self.descriptors {
            match phase {
                Phase::Init => {
                    d.frozen = true;
                    if !d.enabled || d.state != DescriptorState::Registered {
                        continue;
                    }
                    tally.visited += 1;
                    match d.sensor.init() {
                        Ok(()) => {
                            info!("Registry: {} ready", d.id());
                            d.state = DescriptorState::Ready;
                        }
                        Err(e) => {
                            warn!("Registry: {} init failed: {}", d.id(), e);
                            d.state = DescriptorState::Faulted;
                            tally.faulted.push(d.id());
                        }
                    }
                }
                Phase::Prepare => {
                    if !d.active() {
                        continue;
                    }
                    tally.visited += 1;
                    d.sensor.prepare();
                }
                Phase::Fetch => {
                    if !d.active() {
                        continue;
                    }
                    tally.visited += 1;
                    let Descriptor { sensor, topic, .. } = d;
                    let mut sink = PatternSink {
                        pattern: topic.as_str(),
                        on_reading: &mut *on_output,
                        count: 0,
                    };
                    match sensor.fetch(clock, &mut sink) {
                        FetchStatus::Complete => {}
                        FetchStatus::NoData => tally.no_data += 1,
                        FetchStatus::Truncated => {
                            debug!("Registry: {} enumeration truncated", sensor.id());
                            tally.truncated += 1;
                        }
                    }
                    tally.readings += sink.count;
                    if let Some(alarm) = sensor.alarm() {
                        tally.alarms += 1;
                        on_output(FetchOutput::Alarm {
                            sensor: sensor.id(),
                            alarm,
                        });
                    }
                }
            }
        }
        tally
    }

    pub fn init_enabled(&mut self, clock: &dyn Clock) -> PhaseTally {
        self.for_each_enabled(Phase::Init, clock, &mut |_: FetchOutput<'_>| {})
    }

    pub fn prepare_enabled(&mut self, clock: &dyn Clock) -> PhaseTally {
        self.for_each_enabled(Phase::Prepare, clock, &mut |_: FetchOutput<'_>| {})
    }

    pub fn fetch_enabled<F>(&mut self, clock: &dyn Clock, on_output: &mut F) -> PhaseTally
    where
        F: FnMut(FetchOutput<'_>),
    {
        self.for_each_enabled(Phase::Fetch, clock, on_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SensorError;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct NoClock;

    impl Clock for NoClock {
        fn now_ms(&self) -> u64 {
            0
        }
        fn pause_ms(&self, _ms: u64) {}
    }

    /// Records every lifecycle call into a shared journal.
    struct Probe {
        id: &'static str,
        journal: Rc<RefCell<Vec<String>>>,
        fail_init: bool,
        readings: u32,
    }

    impl Probe {
        fn boxed(id: &'static str, journal: &Rc<RefCell<Vec<String>>>) -> Box<Self> {
            Box::new(Self {
                id,
                journal: journal.clone(),
                fail_init: false,
                readings: 1,
            })
        }

        fn log(&self, op: &str) {
            self.journal.borrow_mut().push(format!("{}:{}", op, self.id));
        }
    }

    impl Sensor for Probe {
        fn id(&self) -> &'static str {
            self.id
        }
        fn description(&self) -> &'static str {
            "probe"
        }
        fn default_topic(&self) -> &'static str {
            "probe/{n}"
        }
        fn init(&mut self) -> core::result::Result<(), SensorError> {
            self.log("init");
            if self.fail_init {
                Err(SensorError::NotDetected)
            } else {
                Ok(())
            }
        }
        fn prepare(&mut self) {
            self.log("prepare");
        }
        fn fetch(&mut self, _clock: &dyn Clock, out: &mut dyn ReadingSink) -> FetchStatus {
            self.log("fetch");
            for i in 0..self.readings {
                out.emit(Reading::new(i.to_string(), ""));
            }
            if self.readings == 0 {
                FetchStatus::NoData
            } else {
                FetchStatus::Complete
            }
        }
    }

    fn journal() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    #[test]
    fn duplicate_id_rejected() {
        let j = journal();
        let mut reg = SensorRegistry::new();
        reg.register(Probe::boxed("a", &j)).unwrap();
        assert_eq!(
            reg.register(Probe::boxed("a", &j)),
            Err(Error::Config("duplicate sensor id"))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn default_topic_is_compiled_in_pattern() {
        let j = journal();
        let mut reg = SensorRegistry::new();
        reg.register(Probe::boxed("a", &j)).unwrap();
        assert_eq!(reg.get("a").unwrap().topic(), "probe/{n}");
        assert!(reg.get("a").unwrap().enabled());
    }

    #[test]
    fn passes_follow_registration_order() {
        let j = journal();
        let mut reg = SensorRegistry::new();
        for id in ["c", "a", "b"] {
            reg.register(Probe::boxed(id, &j)).unwrap();
        }
        reg.init_enabled(&NoClock);
        j.borrow_mut().clear();

        for _ in 0..2 {
            reg.prepare_enabled(&NoClock);
            reg.fetch_enabled(&NoClock, &mut |_| {});
        }
        let expected: Vec<String> = ["prepare", "fetch"]
            .iter()
            .flat_map(|op| ["c", "a", "b"].map(|id| format!("{op}:{id}")))
            .collect();
        assert_eq!(j.borrow()[..6], expected[..]);
        assert_eq!(j.borrow()[6..], expected[..]);
    }

    #[test]
    fn disabled_descriptor_sees_no_calls() {
        let j = journal();
        let mut reg = SensorRegistry::new();
        reg.register(Probe::boxed("on", &j)).unwrap();
        reg.register(Probe::boxed("off", &j)).unwrap();
        reg.get_mut("off").unwrap().set_enabled(false).unwrap();

        reg.init_enabled(&NoClock);
        reg.prepare_enabled(&NoClock);
        reg.fetch_enabled(&NoClock, &mut |_| {});

        assert!(j.borrow().iter().all(|e| !e.ends_with(":off")));
        assert_eq!(j.borrow().len(), 3);
    }

    #[test]
    fn descriptors_freeze_after_init() {
        let j = journal();
        let mut reg = SensorRegistry::new();
        reg.register(Probe::boxed("a", &j)).unwrap();
        reg.get_mut("a").unwrap().set_topic("custom").unwrap();
        reg.init_enabled(&NoClock);

        let d = reg.get_mut("a").unwrap();
        assert_eq!(
            d.set_enabled(false),
            Err(Error::Config("descriptor frozen after init"))
        );
        assert!(d.set_topic("other").is_err());
        assert_eq!(d.topic(), "custom");
    }

    #[test]
    fn failed_init_faults_descriptor_and_skips_polling() {
        let j = journal();
        let mut reg = SensorRegistry::new();
        let mut bad = Probe::boxed("bad", &j);
        bad.fail_init = true;
        reg.register(bad).unwrap();
        reg.register(Probe::boxed("good", &j)).unwrap();

        let tally = reg.init_enabled(&NoClock);
        assert_eq!(tally.faulted, vec!["bad"]);
        assert_eq!(reg.get("bad").unwrap().state(), DescriptorState::Faulted);

        j.borrow_mut().clear();
        reg.prepare_enabled(&NoClock);
        let tally = reg.fetch_enabled(&NoClock, &mut |_| {});
        assert_eq!(tally.visited, 1);
        assert_eq!(*j.borrow(), vec!["prepare:good", "fetch:good"]);
    }

    #[test]
    fn init_is_idempotent() {
        let j = journal();
        let mut reg = SensorRegistry::new();
        reg.register(Probe::boxed("a", &j)).unwrap();
        reg.init_enabled(&NoClock);
        let second = reg.init_enabled(&NoClock);
        assert_eq!(second.visited, 0);
        assert_eq!(j.borrow().len(), 1);
    }

    #[test]
    fn fetch_pairs_readings_with_pattern() {
        let j = journal();
        let mut reg = SensorRegistry::new();
        let mut multi = Probe::boxed("multi", &j);
        multi.readings = 3;
        reg.register(multi).unwrap();
        let mut empty = Probe::boxed("empty", &j);
        empty.readings = 0;
        reg.register(empty).unwrap();
        reg.get_mut("empty").unwrap().set_topic("none").unwrap();
        reg.init_enabled(&NoClock);

        let mut seen = Vec::new();
        let tally = reg.fetch_enabled(&NoClock, &mut |out| {
            if let FetchOutput::Reading { pattern, reading } = out {
                seen.push((pattern.to_owned(), reading.value));
            }
        });
        assert_eq!(tally.readings, 3);
        assert_eq!(tally.no_data, 1);
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|(p, _)| p == "probe/{n}"));
    }
}
