use std::fmt;

use crate::config::FlightConfig;
use crate::error::PhaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightPhase {
    Ground,
    Climb,
    Freefall,
    Canopy,
    Menu,
    Update,
}

impl FlightPhase {
    pub fn name(&self) -> &'static str {
        match self {
            FlightPhase::Ground => "Ground",
            FlightPhase::Climb => "Climb",
            FlightPhase::Freefall => "Freefall",
            FlightPhase::Canopy => "Canopy",
            FlightPhase::Menu => "Menu",
            FlightPhase::Update => "Update",
        }
    }

    /// Single character tagging transition log lines.
    pub fn log_char(&self) -> char {
        match self {
            FlightPhase::Ground => 'G',
            FlightPhase::Climb => 'C',
            FlightPhase::Freefall => 'F',
            FlightPhase::Canopy => 'P',
            FlightPhase::Menu => 'M',
            FlightPhase::Update => 'U',
        }
    }

    /// The transition table. Nothing else may change the phase.
    pub fn can_transition_to(self, to: FlightPhase) -> bool {
        matches!(
            (self, to),
            (FlightPhase::Ground, FlightPhase::Climb)
                | (FlightPhase::Ground, FlightPhase::Menu)
                | (FlightPhase::Climb, FlightPhase::Freefall)
                | (FlightPhase::Freefall, FlightPhase::Canopy)
                | (FlightPhase::Canopy, FlightPhase::Ground)
                | (FlightPhase::Menu, FlightPhase::Ground)
        )
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One cycle's worth of inputs, sampled once and reused for the whole cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseInput {
    pub now_ms: u64,
    pub altitude: f32,
    pub climb_rate: f32,
    /// Tick at which the current press of the enter button started.
    pub enter_pressed_since: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: FlightPhase,
    pub to: FlightPhase,
    pub at_ms: u64,
}

pub struct PhaseStateMachine {
    phase: FlightPhase,
    previous: Option<FlightPhase>,
    entered_at_ms: u64,
    thresholds: FlightConfig,
    menu_enter_hold_ms: u64,
    menu_exit_hold_ms: u64,
}

impl PhaseStateMachine {
    /// Starts on the ground.
    pub fn new(
        thresholds: FlightConfig,
        menu_enter_hold_ms: u64,
        menu_exit_hold_ms: u64,
        now_ms: u64,
    ) -> Self {
        PhaseStateMachine {
            phase: FlightPhase::Ground,
            previous: None,
            entered_at_ms: now_ms,
            thresholds,
            menu_enter_hold_ms,
            menu_exit_hold_ms,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn previous_phase(&self) -> Option<FlightPhase> {
        self.previous
    }

    pub fn entered_at_ms(&self) -> u64 {
        self.entered_at_ms
    }

    pub fn time_in_phase_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.entered_at_ms)
    }

    pub fn thresholds(&self) -> &FlightConfig {
        &self.thresholds
    }

    /// Replaces the thresholds, e.g. after the unit system changed.
    pub fn set_thresholds(&mut self, thresholds: FlightConfig) {
        self.thresholds = thresholds;
    }

    /// Determines if the phase should change given this cycle's inputs.
    pub fn should_transition(&self, input: &PhaseInput) -> Option<FlightPhase> {
        match self.phase {
            FlightPhase::Ground => {
                if input.altitude > self.thresholds.launch_altitude {
                    Some(FlightPhase::Climb)
                } else if self.enter_held_for(input, self.menu_enter_hold_ms) {
                    Some(FlightPhase::Menu)
                } else {
                    None
                }
            }
            FlightPhase::Climb => {
                (input.climb_rate < self.thresholds.freefall_rate).then_some(FlightPhase::Freefall)
            }
            FlightPhase::Freefall => {
                (input.climb_rate > self.thresholds.canopy_rate).then_some(FlightPhase::Canopy)
            }
            FlightPhase::Canopy => {
                (input.altitude < self.thresholds.landing_altitude).then_some(FlightPhase::Ground)
            }
            FlightPhase::Menu => self
                .enter_held_for(input, self.menu_exit_hold_ms)
                .then_some(FlightPhase::Ground),
            FlightPhase::Update => None,
        }
    }

    /// Evaluates the rules and applies at most one transition.
    pub fn update(&mut self, input: &PhaseInput) -> Option<Transition> {
        let to = self.should_transition(input)?;
        self.transition(to, input.now_ms).ok()
    }

    /// Moves to `to`, restarting the time-in-phase counter.
    pub fn transition(&mut self, to: FlightPhase, now_ms: u64) -> Result<Transition, PhaseError> {
        let from = self.phase;
        if !from.can_transition_to(to) {
            return Err(PhaseError::IllegalTransition { from, to });
        }
        self.previous = Some(from);
        self.phase = to;
        self.entered_at_ms = now_ms;
        Ok(Transition {
            from,
            to,
            at_ms: now_ms,
        })
    }

    /// Only presses that began inside the current phase count, so a hold
    /// that opened the menu cannot also close it.
    fn enter_held_for(&self, input: &PhaseInput, duration_ms: u64) -> bool {
        input.enter_pressed_since.is_some_and(|since| {
            since >= self.entered_at_ms && input.now_ms.saturating_sub(since) >= duration_ms
        })
    }
}
