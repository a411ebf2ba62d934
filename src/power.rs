//! Suspension and wake-up.
//!
//! A suspended device runs nothing. It comes back through its
//! initialization entry point and asks [`PowerControl::wakeup_cause`] why.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::buttons::{Button, is_low, open_input};
use crate::constants::POWER_DOWN_SETTLE_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeCause {
    Timer,
    External,
    ColdStart,
}

/// Both wake sources are mandatory: a suspension always ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeSources {
    pub timer_ms: u64,
    pub external_pin: u64,
}

pub trait PowerControl {
    fn wakeup_cause(&self) -> WakeCause;
    /// Halts until one of `sources` fires.
    fn suspend(&mut self, sources: &WakeSources);
}

/// The external wake line. Only a fresh press counts: a button already held
/// when the device suspends has to be released and pressed again.
struct WakeLine {
    button: Button,
}

impl WakeLine {
    fn armed(low_at_suspend: bool) -> Self {
        let mut button = Button::default();
        button.read(low_at_suspend, 0);
        WakeLine { button }
    }

    fn fired(&mut self, low: bool, now_ms: u64) -> bool {
        self.button.read(low, now_ms);
        self.button.was_pressed()
    }
}

/// Deep sleep emulation for the host board: blocks until the wake timer
/// runs out or the external line goes low.
pub struct HostPower {
    cause: WakeCause,
    poll_interval: Duration,
}

impl HostPower {
    pub fn new(poll_interval: Duration) -> Self {
        HostPower {
            cause: WakeCause::ColdStart,
            poll_interval,
        }
    }
}

impl PowerControl for HostPower {
    fn wakeup_cause(&self) -> WakeCause {
        self.cause
    }

    fn suspend(&mut self, sources: &WakeSources) {
        info!(
            "Suspending: timer {} ms, external GPIO {}",
            sources.timer_ms, sources.external_pin
        );
        thread::sleep(Duration::from_millis(POWER_DOWN_SETTLE_MS));
        let external = match open_input(sources.external_pin) {
            Ok(pin) => Some(pin),
            Err(e) => {
                warn!("External wake line unavailable, timer only: {}", e);
                None
            }
        };

        let mut line = WakeLine::armed(external.as_ref().is_some_and(is_low));
        let start = Instant::now();
        let timer = Duration::from_millis(sources.timer_ms);
        self.cause = loop {
            let now_ms = start.elapsed().as_millis() as u64;
            if line.fired(external.as_ref().is_some_and(is_low), now_ms) {
                break WakeCause::External;
            }
            if start.elapsed() >= timer {
                break WakeCause::Timer;
            }
            thread::sleep(self.poll_interval);
        };
        info!("Woke up: {:?}", self.cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wake_line_fires_on_falling_edge() {
        let mut line = WakeLine::armed(false);
        assert!(!line.fired(false, 50));
        assert!(line.fired(true, 100));
    }

    #[test]
    fn test_held_button_does_not_wake() {
        let mut line = WakeLine::armed(true);
        assert!(!line.fired(true, 50));
        assert!(!line.fired(true, 100));
        assert!(!line.fired(false, 150));
        assert!(line.fired(true, 200));
    }
}
