//! Simulated collaborators for tests and trace replay.
//!
//! Every handle is cheap to clone and clones share state, so a test can keep
//! one copy to drive or inspect while the device owns the other.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::altitude::{PressureSensor, pressure_to_altitude_m};
use crate::buttons::{ButtonInput, ButtonLevels};
use crate::clock::Clock;
use crate::display::{Display, Frame};
use crate::error::AltimeterError;
use crate::power::{PowerControl, WakeCause, WakeSources};
use crate::retained::{RetainedMemory, RetainedState};

const SEA_LEVEL_HPA: f32 = 1013.25;

/// Barometer that reports whatever altitude it was last given.
#[derive(Clone)]
pub struct ScriptedBarometer {
    altitude_m: Rc<Cell<f32>>,
    pressure_hpa: Rc<Cell<f32>>,
    reads: Rc<Cell<u32>>,
}

impl ScriptedBarometer {
    pub fn new(altitude_m: f32) -> Self {
        ScriptedBarometer {
            altitude_m: Rc::new(Cell::new(altitude_m)),
            pressure_hpa: Rc::new(Cell::new(SEA_LEVEL_HPA)),
            reads: Rc::new(Cell::new(0)),
        }
    }

    /// Barometer at a fixed pressure; altitude follows from the baseline.
    pub fn with_pressure(pressure_hpa: f32) -> Self {
        let barometer = Self::new(f32::NAN);
        barometer.pressure_hpa.set(pressure_hpa);
        barometer
    }

    pub fn set_altitude(&self, altitude_m: f32) {
        self.altitude_m.set(altitude_m);
    }

    /// Only consulted by barometers made with [`Self::with_pressure`].
    pub fn set_pressure(&self, pressure_hpa: f32) {
        self.pressure_hpa.set(pressure_hpa);
    }

    /// Number of sensor reads so far.
    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl PressureSensor for ScriptedBarometer {
    fn read_pressure_hpa(&mut self) -> f32 {
        self.reads.set(self.reads.get() + 1);
        self.pressure_hpa.get()
    }

    fn read_altitude_m(&mut self, baseline_hpa: f32) -> f32 {
        let altitude = self.altitude_m.get();
        if altitude.is_nan() {
            return pressure_to_altitude_m(self.read_pressure_hpa(), baseline_hpa);
        }
        self.reads.set(self.reads.get() + 1);
        altitude
    }
}

#[derive(Clone, Default)]
pub struct ScriptedButtons {
    levels: Rc<Cell<ButtonLevels>>,
}

impl ScriptedButtons {
    pub fn set(&self, levels: ButtonLevels) {
        self.levels.set(levels);
    }

    pub fn set_enter(&self, pressed: bool) {
        self.levels.set(ButtonLevels {
            enter: pressed,
            ..self.levels.get()
        });
    }

    pub fn release_all(&self) {
        self.levels.set(ButtonLevels::default());
    }
}

impl ButtonInput for ScriptedButtons {
    fn levels(&mut self) -> ButtonLevels {
        self.levels.get()
    }
}

/// Display that keeps every frame it was asked to draw.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    frames: Rc<RefCell<Vec<Frame>>>,
    power_saves: Rc<Cell<u32>>,
}

impl RecordingDisplay {
    pub fn frames(&self) -> Vec<Frame> {
        self.frames.borrow().clone()
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.frames.borrow().last().copied()
    }

    pub fn power_saves(&self) -> u32 {
        self.power_saves.get()
    }
}

impl Display for RecordingDisplay {
    fn render(&mut self, frame: &Frame) {
        self.frames.borrow_mut().push(*frame);
    }

    fn power_save(&mut self) {
        self.power_saves.set(self.power_saves.get() + 1);
    }
}

#[derive(Clone, Default)]
pub struct MemoryRetained {
    state: Rc<Cell<Option<RetainedState>>>,
}

impl RetainedMemory for MemoryRetained {
    fn load(&mut self) -> Option<RetainedState> {
        self.state.get()
    }

    fn store(&mut self, state: &RetainedState) -> Result<(), AltimeterError> {
        self.state.set(Some(*state));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), AltimeterError> {
        self.state.set(None);
        Ok(())
    }
}

/// Power control whose next wake cause is chosen by the test.
#[derive(Clone)]
pub struct SimPower {
    cause: Rc<Cell<WakeCause>>,
    next_wake: Rc<Cell<WakeCause>>,
    suspensions: Rc<RefCell<Vec<WakeSources>>>,
}

impl SimPower {
    pub fn new() -> Self {
        SimPower {
            cause: Rc::new(Cell::new(WakeCause::ColdStart)),
            next_wake: Rc::new(Cell::new(WakeCause::Timer)),
            suspensions: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn wake_next_by(&self, cause: WakeCause) {
        self.next_wake.set(cause);
    }

    pub fn suspensions(&self) -> Vec<WakeSources> {
        self.suspensions.borrow().clone()
    }
}

impl Default for SimPower {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerControl for SimPower {
    fn wakeup_cause(&self) -> WakeCause {
        self.cause.get()
    }

    fn suspend(&mut self, sources: &WakeSources) {
        self.suspensions.borrow_mut().push(*sources);
        self.cause.set(self.next_wake.get());
    }
}

#[derive(Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}
