//! Portal button driver.
//!
//! ## Hardware
//!
//! Active-low momentary switch on [`BUTTON_GPIO`](crate::pins::BUTTON_GPIO)
//! with an external pull-up.  The pin is polled from the cooperative wait
//! loops rather than interrupt-driven: the node only cares about the
//! button while it is idle between cycles or waiting for WiFi.
//!
//! ## Debounce
//!
//! A press counts when the pin reads low, stays low across a
//! [`DEBOUNCE_MS`] pause, and reads low again.  A single low sample
//! (contact bounce, EMI on a long lead) is ignored.

use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::app::ports::{Clock, PortalTrigger};

pub const DEBOUNCE_MS: u64 = 50;

pub struct PortalButton<P> {
    pin: P,
    read_error_logged: bool,
}

impl<P: InputPin> PortalButton<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            read_error_logged: false,
        }
    }

    fn is_low(&mut self) -> bool {
        match self.pin.is_low() {
            Ok(low) => low,
            Err(e) => {
                if !self.read_error_logged {
                    warn!("Button: pin read failed ({:?}), treating as released", e);
                    self.read_error_logged = true;
                }
                false
            }
        }
    }
}

impl<P: InputPin> PortalTrigger for PortalButton<P> {
    fn triggered(&mut self, clock: &dyn Clock) -> bool {
        if !self.is_low() {
            return false;
        }
        clock.pause_ms(DEBOUNCE_MS);
        if !self.is_low() {
            return false;
        }
        info!("Button: held low for {}ms, portal requested", DEBOUNCE_MS);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use std::collections::VecDeque;

    /// Pin that replays scripted levels, then stays high (released).
    struct ScriptedPin {
        lows: VecDeque<bool>,
    }

    impl ErrorType for ScriptedPin {
        type Error = Infallible;
    }

    impl InputPin for ScriptedPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            self.is_low().map(|l| !l)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(self.lows.pop_front().unwrap_or(false))
        }
    }

    struct StepClock {
        now: Cell<u64>,
    }

    impl Clock for StepClock {
        fn now_ms(&self) -> u64 {
            self.now.get()
        }
        fn pause_ms(&self, ms: u64) {
            self.now.set(self.now.get() + ms);
        }
    }

    fn button(levels: &[bool]) -> PortalButton<ScriptedPin> {
        PortalButton::new(ScriptedPin {
            lows: levels.iter().copied().collect(),
        })
    }

    #[test]
    fn released_pin_never_triggers() {
        let clock = StepClock { now: Cell::new(0) };
        let mut b = button(&[]);
        assert!(!b.triggered(&clock));
        assert_eq!(clock.now_ms(), 0, "no debounce pause when released");
    }

    #[test]
    fn sustained_low_triggers_after_debounce() {
        let clock = StepClock { now: Cell::new(0) };
        let mut b = button(&[true, true]);
        assert!(b.triggered(&clock));
        assert_eq!(clock.now_ms(), DEBOUNCE_MS);
    }

    #[test]
    fn single_low_sample_is_bounce() {
        let clock = StepClock { now: Cell::new(0) };
        let mut b = button(&[true, false]);
        assert!(!b.triggered(&clock));
    }
}
