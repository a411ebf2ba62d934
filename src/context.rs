use tracing::{debug, info, warn};

use crate::altitude::{AltitudeFilter, BaselinePressure, PressureSensor};
use crate::buttons::{Button, ButtonInput};
use crate::climb_rate::ClimbRateEstimator;
use crate::clock::Clock;
use crate::config::{DeviceConfig, UnitSystem};
use crate::constants::{CLIMB_REDRAW_MS, DESCENT_REDRAW_MS, GROUND_REDRAW_MS};
use crate::display::{Display, Frame};
use crate::error::AltimeterError;
use crate::power::{PowerControl, WakeCause, WakeSources};
use crate::retained::{RetainedMemory, RetainedState};
use crate::sleep::{SleepDecision, SleepScheduler};
use crate::state::{FlightPhase, PhaseInput, PhaseStateMachine, Transition};

/// Hardware handed to a device for one session.
pub struct Peripherals<P, B, D> {
    pub primary: P,
    pub secondary: Option<P>,
    pub buttons: B,
    pub display: D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootOutcome {
    Running,
    /// Nothing happened while suspended; go straight back.
    Resuspend(WakeSources),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Continue,
    Suspend(WakeSources),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Suspended,
    Stopped,
}

/// All runtime state of the altimeter. Rebuilt from scratch on every wake.
pub struct Device<P, B, D> {
    config: DeviceConfig,
    filter: AltitudeFilter<P>,
    climb: ClimbRateEstimator,
    phase: PhaseStateMachine,
    sleep: SleepScheduler,
    buttons: B,
    enter: Button,
    up: Button,
    down: Button,
    display: D,
    baseline: BaselinePressure,
    altitude: f32,
    climb_rate: f32,
    last_redraw_ms: Option<u64>,
}

impl<P: PressureSensor, B: ButtonInput, D: Display> Device<P, B, D> {
    /// Initialization entry point, run at power-on and after every wake.
    pub fn boot(
        config: DeviceConfig,
        peripherals: Peripherals<P, B, D>,
        cause: WakeCause,
        retained: Option<RetainedState>,
        now_ms: u64,
    ) -> (Self, BootOutcome) {
        let units = config.units;
        let thresholds = config.thresholds(units);
        let mut filter = AltitudeFilter::new(
            peripherals.primary,
            peripherals.secondary,
            units,
            config.sample_interval_ms,
        );

        let baseline = match (cause, retained) {
            (WakeCause::ColdStart, _) | (_, None) => {
                let baseline = filter.calibrate();
                info!("Calibrated ground baseline: {:.2} hPa", baseline.primary_hpa);
                baseline
            }
            (_, Some(state)) => state.baseline,
        };

        let climb = ClimbRateEstimator::new(config.climb_rate_window, config.sample_interval_ms);
        let mut device = Device {
            climb_rate: climb.climb_rate,
            climb,
            phase: PhaseStateMachine::new(
                thresholds,
                config.menu_enter_hold_ms,
                config.menu_exit_hold_ms,
                now_ms,
            ),
            sleep: SleepScheduler::new(
                config.inactivity_window_ms,
                thresholds.activity_altitude,
                now_ms,
            ),
            filter,
            buttons: peripherals.buttons,
            enter: Button::default(),
            up: Button::default(),
            down: Button::default(),
            display: peripherals.display,
            baseline,
            altitude: 0.0,
            last_redraw_ms: None,
            config,
        };

        let outcome = match (cause, retained) {
            (WakeCause::Timer, Some(state)) => device.check_altitude_after_wakeup(&state, now_ms),
            (WakeCause::Timer, None) => {
                warn!("Timer wake without retained state, staying on the ground");
                BootOutcome::Running
            }
            (WakeCause::External, _) => {
                info!("Woken by button");
                BootOutcome::Running
            }
            (WakeCause::ColdStart, _) => BootOutcome::Running,
        };
        (device, outcome)
    }

    /// One control cycle: sample, estimate, evaluate, draw.
    pub fn step(&mut self, now_ms: u64) -> CycleOutcome {
        self.resample(now_ms);
        self.read_buttons(now_ms);

        let input = PhaseInput {
            now_ms,
            altitude: self.altitude,
            climb_rate: self.climb_rate,
            enter_pressed_since: self.enter.pressed_since(),
        };
        let transition = self.phase.update(&input);
        if let Some(transition) = transition {
            self.on_transition(&transition);
        }

        if self.phase.phase() == FlightPhase::Menu && transition.is_none() {
            self.menu_actions(now_ms);
        }

        let decision = self.sleep.evaluate(self.phase.phase(), self.altitude, now_ms);
        if decision == SleepDecision::Suspend {
            info!(
                "No activity for {} ms on the ground, going to sleep",
                self.sleep.inactive_for_ms(now_ms)
            );
            self.display.power_save();
            return CycleOutcome::Suspend(self.wake_sources());
        }

        self.redraw(now_ms, transition.is_some());
        CycleOutcome::Continue
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase.phase()
    }

    pub fn altitude(&self) -> f32 {
        self.altitude
    }

    pub fn climb_rate(&self) -> f32 {
        self.climb_rate
    }

    pub fn baseline(&self) -> BaselinePressure {
        self.baseline
    }

    pub fn units(&self) -> UnitSystem {
        self.filter.units()
    }

    /// The snapshot written to retained memory before suspending.
    pub fn snapshot(&self) -> RetainedState {
        RetainedState {
            baseline: self.baseline,
            last_altitude_m: self.units().to_metres(self.altitude).round() as i32,
        }
    }

    /// Telemetry of the current cycle as the display receives it.
    pub fn frame(&self) -> Frame {
        let time_to_exit_s = match self.phase.phase() {
            FlightPhase::Climb => self
                .climb
                .time_to_altitude(self.altitude, self.phase.thresholds().exit_altitude),
            _ => None,
        };
        Frame {
            phase: self.phase.phase(),
            altitude: self.altitude,
            climb_rate: self.climb_rate,
            time_to_exit_s,
            units: self.units(),
            baseline_hpa: self.baseline.primary_hpa,
        }
    }

    /// Switches units; thresholds and rate history follow.
    pub fn set_units(&mut self, units: UnitSystem) {
        let thresholds = self.config.thresholds(units);
        self.filter.set_units(units);
        self.climb.reset();
        self.phase.set_thresholds(thresholds);
        self.sleep.set_activity_altitude(thresholds.activity_altitude);
        info!("Units switched to {}", units.label());
    }

    /// Takes a new ground reference. Refused once off the ground.
    pub fn recalibrate(&mut self) -> bool {
        if !matches!(self.phase.phase(), FlightPhase::Ground | FlightPhase::Menu) {
            warn!("Refusing to recalibrate during {}", self.phase.phase());
            return false;
        }
        self.baseline = self.filter.calibrate();
        self.climb.reset();
        info!("Recalibrated ground baseline: {:.2} hPa", self.baseline.primary_hpa);
        true
    }

    fn resample(&mut self, now_ms: u64) {
        let sample = self.filter.sample(&self.baseline, now_ms);
        self.altitude = sample.altitude;
        self.climb_rate = self.climb.update(sample.altitude, sample.taken_at_ms);
    }

    fn check_altitude_after_wakeup(&mut self, retained: &RetainedState, now_ms: u64) -> BootOutcome {
        self.resample(now_ms);
        debug!(
            "Wake-up check: altitude {:.1} {} (was {} m)",
            self.altitude,
            self.units().label(),
            retained.last_altitude_m
        );

        if self.altitude > self.phase.thresholds().launch_altitude {
            match self.phase.transition(FlightPhase::Climb, now_ms) {
                Ok(transition) => self.on_transition(&transition),
                Err(e) => warn!("{}", e),
            }
            self.redraw(now_ms, true);
            BootOutcome::Running
        } else {
            info!("No altitude change, going back to sleep");
            self.display.power_save();
            BootOutcome::Resuspend(self.wake_sources())
        }
    }

    fn read_buttons(&mut self, now_ms: u64) {
        let levels = self.buttons.levels();
        self.enter.read(levels.enter, now_ms);
        self.up.read(levels.up, now_ms);
        self.down.read(levels.down, now_ms);
        if self.enter.was_pressed() || self.up.was_pressed() || self.down.was_pressed() {
            self.sleep.note_activity(now_ms);
        }
    }

    /// Up toggles units, down takes a new baseline. Both drop the cached
    /// sample, so the redraw shows a fresh reading.
    fn menu_actions(&mut self, now_ms: u64) {
        if self.up.was_pressed() {
            self.set_units(self.units().toggled());
            self.resample(now_ms);
            self.redraw(now_ms, true);
        }
        if self.down.was_pressed() && self.recalibrate() {
            self.resample(now_ms);
            self.redraw(now_ms, true);
        }
    }

    fn on_transition(&mut self, transition: &Transition) {
        info!(
            "[{}] {} -> {} at {} ms (altitude {:.0} {}, climb rate {:.1})",
            transition.to.log_char(),
            transition.from,
            transition.to,
            transition.at_ms,
            self.altitude,
            self.units().label(),
            self.climb_rate
        );
        self.sleep.note_activity(transition.at_ms);
    }

    fn redraw(&mut self, now_ms: u64, force: bool) {
        let interval = match self.phase.phase() {
            FlightPhase::Ground => GROUND_REDRAW_MS,
            FlightPhase::Climb | FlightPhase::Update => CLIMB_REDRAW_MS,
            FlightPhase::Freefall | FlightPhase::Canopy | FlightPhase::Menu => DESCENT_REDRAW_MS,
        };
        let due = self
            .last_redraw_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= interval);
        if force || due {
            let frame = self.frame();
            self.display.render(&frame);
            self.last_redraw_ms = Some(now_ms);
        }
    }

    fn wake_sources(&self) -> WakeSources {
        WakeSources {
            timer_ms: self.config.wake_timer_ms,
            external_pin: self.config.hardware.enter_pin,
        }
    }
}

/// Runs one power session: initialization, control cycles until the device
/// suspends, then the suspension itself.
///
/// `pause` runs between cycles and returns `false` to stop early.
pub fn run_session<P, B, D, C, W, R>(
    config: &DeviceConfig,
    peripherals: Peripherals<P, B, D>,
    clock: &C,
    power: &mut W,
    retained: &mut R,
    mut pause: impl FnMut() -> bool,
) -> Result<SessionEnd, AltimeterError>
where
    P: PressureSensor,
    B: ButtonInput,
    D: Display,
    C: Clock,
    W: PowerControl,
    R: RetainedMemory,
{
    let cause = power.wakeup_cause();
    let snapshot = match cause {
        WakeCause::ColdStart => {
            retained.clear()?;
            None
        }
        _ => retained.load(),
    };

    let (mut device, outcome) =
        Device::boot(config.clone(), peripherals, cause, snapshot, clock.now_ms());
    let sources = match outcome {
        BootOutcome::Resuspend(sources) => sources,
        BootOutcome::Running => loop {
            if let CycleOutcome::Suspend(sources) = device.step(clock.now_ms()) {
                break sources;
            }
            if !pause() {
                return Ok(SessionEnd::Stopped);
            }
        },
    };

    retained.store(&device.snapshot())?;
    drop(device);
    power.suspend(&sources);
    Ok(SessionEnd::Suspended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buttons::ButtonLevels;
    use crate::constants::NOMINAL_CLIMB_RATE;
    use crate::sim::{RecordingDisplay, ScriptedBarometer, ScriptedButtons};

    type SimDevice = Device<ScriptedBarometer, ScriptedButtons, RecordingDisplay>;

    struct Rig {
        barometer: ScriptedBarometer,
        buttons: ScriptedButtons,
        display: RecordingDisplay,
    }

    impl Rig {
        fn new(altitude_m: f32) -> Self {
            Rig {
                barometer: ScriptedBarometer::new(altitude_m),
                buttons: ScriptedButtons::default(),
                display: RecordingDisplay::default(),
            }
        }

        fn peripherals(&self) -> Peripherals<ScriptedBarometer, ScriptedButtons, RecordingDisplay> {
            Peripherals {
                primary: self.barometer.clone(),
                secondary: None,
                buttons: self.buttons.clone(),
                display: self.display.clone(),
            }
        }

        fn boot(&self, cause: WakeCause, retained: Option<RetainedState>) -> (SimDevice, BootOutcome) {
            Device::boot(DeviceConfig::default(), self.peripherals(), cause, retained, 0)
        }
    }

    fn retained() -> RetainedState {
        RetainedState {
            baseline: BaselinePressure {
                primary_hpa: 1013.25,
                secondary_hpa: None,
            },
            last_altitude_m: 0,
        }
    }

    #[test]
    fn test_cold_start_calibrates_on_ground() {
        let rig = Rig::new(0.0);
        let (device, outcome) = rig.boot(WakeCause::ColdStart, Some(retained()));
        assert_eq!(outcome, BootOutcome::Running);
        assert_eq!(device.phase(), FlightPhase::Ground);
        // Calibration read the sensor.
        assert_eq!(rig.barometer.reads(), 1);
    }

    #[test]
    fn test_launch_from_altitude_sequence() {
        let rig = Rig::new(0.0);
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);
        let mut phases = Vec::new();
        for (i, altitude) in [0.0, 0.0, 0.0, 60.0, 70.0, 80.0].iter().enumerate() {
            rig.barometer.set_altitude(*altitude);
            device.step(i as u64 * 200);
            phases.push(device.phase());
        }
        use FlightPhase::*;
        assert_eq!(phases, vec![Ground, Ground, Ground, Climb, Climb, Climb]);
    }

    #[test]
    fn test_step_within_interval_is_cached() {
        let rig = Rig::new(12.0);
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);
        device.step(1_000);
        let reads = rig.barometer.reads();
        let first = (device.altitude(), device.climb_rate());

        rig.barometer.set_altitude(40.0);
        device.step(1_100);
        assert_eq!((device.altitude(), device.climb_rate()), first);
        assert_eq!(rig.barometer.reads(), reads);
    }

    #[test]
    fn test_ground_suspends_once_after_inactivity() {
        let rig = Rig::new(0.0);
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);
        let mut suspends = 0;
        for now in (0..=40_000).step_by(200) {
            if let CycleOutcome::Suspend(sources) = device.step(now) {
                suspends += 1;
                assert_eq!(now, 30_000);
                assert_eq!(sources.timer_ms, 30_000);
            }
        }
        assert_eq!(suspends, 1);
        assert_eq!(rig.display.power_saves(), 1);
    }

    #[test]
    fn test_timer_wake_above_launch_resumes_in_climb() {
        let rig = Rig::new(120.0);
        let (device, outcome) = rig.boot(WakeCause::Timer, Some(retained()));
        assert_eq!(outcome, BootOutcome::Running);
        assert_eq!(device.phase(), FlightPhase::Climb);
        assert_eq!(device.baseline(), retained().baseline);
        assert_eq!(rig.display.last_frame().map(|f| f.phase), Some(FlightPhase::Climb));
    }

    #[test]
    fn test_timer_wake_on_ground_resuspends() {
        let rig = Rig::new(3.0);
        let (device, outcome) = rig.boot(WakeCause::Timer, Some(retained()));
        assert!(matches!(outcome, BootOutcome::Resuspend(_)));
        assert_eq!(device.phase(), FlightPhase::Ground);
        assert_eq!(rig.display.power_saves(), 1);
    }

    #[test]
    fn test_button_wake_resumes_ground() {
        let rig = Rig::new(300.0);
        let (device, outcome) = rig.boot(WakeCause::External, Some(retained()));
        assert_eq!(outcome, BootOutcome::Running);
        assert_eq!(device.phase(), FlightPhase::Ground);
        // The retained baseline is reused, not recalibrated.
        assert_eq!(rig.barometer.reads(), 0);
    }

    #[test]
    fn test_menu_toggles_units_and_returns() {
        let rig = Rig::new(0.0);
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);

        rig.buttons.set_enter(true);
        device.step(0);
        device.step(1_000);
        assert_eq!(device.phase(), FlightPhase::Menu);
        rig.buttons.release_all();
        device.step(1_200);

        rig.buttons.set(ButtonLevels {
            up: true,
            ..ButtonLevels::default()
        });
        device.step(1_400);
        assert_eq!(device.units(), UnitSystem::Feet);
        rig.buttons.release_all();
        device.step(1_600);

        rig.buttons.set_enter(true);
        device.step(2_000);
        device.step(3_999);
        assert_eq!(device.phase(), FlightPhase::Menu);
        device.step(4_000);
        assert_eq!(device.phase(), FlightPhase::Ground);
    }

    #[test]
    fn test_button_press_delays_sleep() {
        let rig = Rig::new(0.0);
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);
        for now in (0..20_000).step_by(200) {
            assert_eq!(device.step(now), CycleOutcome::Continue);
        }
        rig.buttons.set(ButtonLevels {
            down: true,
            ..ButtonLevels::default()
        });
        device.step(20_000);
        rig.buttons.release_all();
        for now in (20_200..50_000).step_by(200) {
            assert_eq!(device.step(now), CycleOutcome::Continue);
        }
        assert!(matches!(device.step(50_000), CycleOutcome::Suspend(_)));
    }

    #[test]
    fn test_recalibrate_refused_in_flight() {
        let rig = Rig::new(500.0);
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);
        device.step(0);
        assert_eq!(device.phase(), FlightPhase::Climb);
        assert!(!device.recalibrate());
    }

    fn enter_menu(rig: &Rig, device: &mut SimDevice) {
        rig.buttons.set_enter(true);
        device.step(0);
        device.step(1_000);
        assert_eq!(device.phase(), FlightPhase::Menu);
        rig.buttons.release_all();
        device.step(1_200);
    }

    #[test]
    fn test_unit_toggle_redraws_in_new_units() {
        let rig = Rig::new(30.48);
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);
        enter_menu(&rig, &mut device);

        rig.buttons.set(ButtonLevels {
            up: true,
            ..ButtonLevels::default()
        });
        device.step(1_400);
        let frame = rig.display.last_frame().unwrap();
        assert_eq!(frame.units, UnitSystem::Feet);
        assert!((frame.altitude - 100.0).abs() < 0.01);
        assert_eq!(frame.climb_rate, NOMINAL_CLIMB_RATE);
    }

    #[test]
    fn test_menu_recalibration_takes_new_baseline() {
        let rig = Rig {
            barometer: ScriptedBarometer::with_pressure(1013.25),
            buttons: ScriptedButtons::default(),
            display: RecordingDisplay::default(),
        };
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);
        enter_menu(&rig, &mut device);

        // Weather moves the ground pressure while the device sits in the menu.
        rig.barometer.set_pressure(1010.0);
        device.step(1_400);
        assert!(device.altitude() > 20.0);

        rig.buttons.set(ButtonLevels {
            down: true,
            ..ButtonLevels::default()
        });
        device.step(1_600);
        assert_eq!(device.baseline().primary_hpa, 1010.0);
        let frame = rig.display.last_frame().unwrap();
        assert_eq!(frame.baseline_hpa, 1010.0);
        assert!(frame.altitude.abs() < 0.01);
    }

    #[test]
    fn test_climb_rate_never_zero_before_first_step() {
        let rig = Rig::new(0.0);
        let (device, _) = rig.boot(WakeCause::ColdStart, None);
        assert_eq!(device.climb_rate(), NOMINAL_CLIMB_RATE);
    }

    #[test]
    fn test_snapshot_in_metres() {
        let rig = Rig::new(30.48);
        let (mut device, _) = rig.boot(WakeCause::ColdStart, None);
        device.set_units(UnitSystem::Feet);
        device.step(0);
        assert!((device.altitude() - 100.0).abs() < 0.01);
        assert_eq!(device.snapshot().last_altitude_m, 30);
    }
}
