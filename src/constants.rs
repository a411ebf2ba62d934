//! Constants used throughout the program.

/// Minimum time between two barometer reads:
pub const SAMPLE_INTERVAL_MS: u64 = 200;

/// Number of per-interval rates averaged into the published climb rate:
pub const CLIMB_RATE_WINDOW_SIZE: usize = 10;

/// Smallest time delta used when computing a rate, in ticks (ms):
pub const MIN_RATE_DT_MS: u64 = 1;

/// Climb rate published instead of an exact zero:
pub const NOMINAL_CLIMB_RATE: f32 = 0.01;

/// Ground time without activity before the device suspends:
pub const INACTIVITY_WINDOW_MS: u64 = 30_000;

/// Periodic wake-up while suspended:
pub const WAKE_TIMER_MS: u64 = 30_000;

/// Enter held this long on the ground opens the menu:
pub const MENU_ENTER_HOLD_MS: u64 = 1_000;

/// Enter held this long in the menu returns to the ground screen:
pub const MENU_EXIT_HOLD_MS: u64 = 2_000;

/// Pause before suspending so the display can finish powering down:
pub const POWER_DOWN_SETTLE_MS: u64 = 100;

/// Pause between two control cycles of the device loop:
pub const CYCLE_PAUSE_MS: u64 = 20;

/// Metres per foot:
pub const FEET_FACTOR: f32 = 0.3048;

/// Redraw intervals per phase:
pub const GROUND_REDRAW_MS: u64 = 5_000;
pub const CLIMB_REDRAW_MS: u64 = 1_000;
pub const DESCENT_REDRAW_MS: u64 = 500;

/// Freefall altitude is displayed rounded down to this step:
pub const FREEFALL_DISPLAY_STEP: i32 = 50;

// Metric thresholds.
pub const LAUNCH_ALTITUDE_METERS: f32 = 50.0;
pub const FREEFALL_RATE_METERS_PER_SECOND: f32 = -10.0;
pub const CANOPY_RATE_METERS_PER_SECOND: f32 = -6.0;
pub const LANDING_ALTITUDE_METERS: f32 = 15.0;
pub const EXIT_ALTITUDE_METERS: f32 = 4_000.0;
pub const ACTIVITY_ALTITUDE_METERS: f32 = 10.0;

// Imperial thresholds.
pub const LAUNCH_ALTITUDE_FEET: f32 = 150.0;
pub const FREEFALL_RATE_FEET_PER_SECOND: f32 = -33.0;
pub const CANOPY_RATE_FEET_PER_SECOND: f32 = -20.0;
pub const LANDING_ALTITUDE_FEET: f32 = 50.0;
pub const EXIT_ALTITUDE_FEET: f32 = 13_500.0;
pub const ACTIVITY_ALTITUDE_FEET: f32 = 30.0;

// Hardware defaults.
pub const PRIMARY_SENSOR_ADDRESS: u16 = 0x76;
pub const SECONDARY_SENSOR_ADDRESS: u16 = 0x77;
pub const PIN_BUTTON_UP: u64 = 27;
pub const PIN_BUTTON_DOWN: u64 = 22;
pub const PIN_BUTTON_ENTER: u64 = 17;
pub const DISPLAY_BAUD_RATE: u32 = 115_200;
pub const RETAINED_STATE_PATH: &str = "/run/jump-altimeter/retained.json";
