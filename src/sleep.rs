//! Ground inactivity tracking that decides when to suspend.

use crate::state::FlightPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDecision {
    Stay,
    Suspend,
}

pub struct SleepScheduler {
    inactivity_window_ms: u64,
    activity_altitude: f32,
    last_activity_ms: u64,
    reference_altitude: Option<f32>,
    suspend_commanded: bool,
}

impl SleepScheduler {
    pub fn new(inactivity_window_ms: u64, activity_altitude: f32, now_ms: u64) -> Self {
        SleepScheduler {
            inactivity_window_ms,
            activity_altitude,
            last_activity_ms: now_ms,
            reference_altitude: None,
            suspend_commanded: false,
        }
    }

    /// Restarts the inactivity window. Called on user input and phase entry.
    pub fn note_activity(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
        self.suspend_commanded = false;
    }

    pub fn set_activity_altitude(&mut self, activity_altitude: f32) {
        self.activity_altitude = activity_altitude;
        self.reference_altitude = None;
    }

    pub fn inactive_for_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_activity_ms)
    }

    /// Suspension is only ever requested on the ground, and only once per
    /// quiet period.
    pub fn evaluate(&mut self, phase: FlightPhase, altitude: f32, now_ms: u64) -> SleepDecision {
        if phase != FlightPhase::Ground {
            self.reference_altitude = None;
            return SleepDecision::Stay;
        }

        match self.reference_altitude {
            Some(reference) if (altitude - reference).abs() < self.activity_altitude => {}
            Some(_) => {
                self.reference_altitude = Some(altitude);
                self.note_activity(now_ms);
            }
            None => self.reference_altitude = Some(altitude),
        }

        if self.suspend_commanded || self.inactive_for_ms(now_ms) < self.inactivity_window_ms {
            return SleepDecision::Stay;
        }
        self.suspend_commanded = true;
        SleepDecision::Suspend
    }
}
