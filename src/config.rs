//! Device configuration: thresholds, intervals and hardware wiring.
//!
//! Every tunable value lives here with a named field. Defaults come from
//! [`crate::constants`]; a JSON file can override any subset of them.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::*;
use crate::error::AltimeterError;

/// Unit system altitudes and rates are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metres,
    Feet,
}

impl UnitSystem {
    /// Converts an altitude or rate in metres into this unit system.
    pub fn from_metres(self, metres: f32) -> f32 {
        match self {
            UnitSystem::Metres => metres,
            UnitSystem::Feet => metres / FEET_FACTOR,
        }
    }

    pub fn to_metres(self, value: f32) -> f32 {
        match self {
            UnitSystem::Metres => value,
            UnitSystem::Feet => value * FEET_FACTOR,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            UnitSystem::Metres => UnitSystem::Feet,
            UnitSystem::Feet => UnitSystem::Metres,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UnitSystem::Metres => "m",
            UnitSystem::Feet => "ft",
        }
    }
}

/// Phase transition thresholds, all in the unit system they were built for.
///
/// Rates follow the climb-rate convention: positive while climbing, negative
/// while descending.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FlightConfig {
    /// Ground -> Climb once the altitude exceeds this.
    pub launch_altitude: f32,
    /// Climb -> Freefall once the climb rate falls below this.
    pub freefall_rate: f32,
    /// Freefall -> Canopy once the climb rate rises back above this.
    pub canopy_rate: f32,
    /// Canopy -> Ground once the altitude drops below this.
    pub landing_altitude: f32,
    /// Target of the time-to-exit countdown shown while climbing.
    pub exit_altitude: f32,
    /// Altitude drift on the ground that counts as activity for the sleep timer.
    pub activity_altitude: f32,
}

impl FlightConfig {
    pub fn for_units(units: UnitSystem) -> Self {
        match units {
            UnitSystem::Metres => FlightConfig {
                launch_altitude: LAUNCH_ALTITUDE_METERS,
                freefall_rate: FREEFALL_RATE_METERS_PER_SECOND,
                canopy_rate: CANOPY_RATE_METERS_PER_SECOND,
                landing_altitude: LANDING_ALTITUDE_METERS,
                exit_altitude: EXIT_ALTITUDE_METERS,
                activity_altitude: ACTIVITY_ALTITUDE_METERS,
            },
            UnitSystem::Feet => FlightConfig {
                launch_altitude: LAUNCH_ALTITUDE_FEET,
                freefall_rate: FREEFALL_RATE_FEET_PER_SECOND,
                canopy_rate: CANOPY_RATE_FEET_PER_SECOND,
                landing_altitude: LANDING_ALTITUDE_FEET,
                exit_altitude: EXIT_ALTITUDE_FEET,
                activity_altitude: ACTIVITY_ALTITUDE_FEET,
            },
        }
    }

    /// Checks that the thresholds keep their hysteresis ordering.
    pub fn validate(&self) -> Result<(), AltimeterError> {
        if self.freefall_rate >= 0.0 {
            return Err(AltimeterError::InvalidConfig(
                "freefall_rate must be negative".into(),
            ));
        }
        if self.canopy_rate <= self.freefall_rate {
            return Err(AltimeterError::InvalidConfig(
                "canopy_rate must be above freefall_rate".into(),
            ));
        }
        if self.landing_altitude >= self.launch_altitude {
            return Err(AltimeterError::InvalidConfig(
                "landing_altitude must be below launch_altitude".into(),
            ));
        }
        if self.activity_altitude <= 0.0 {
            return Err(AltimeterError::InvalidConfig(
                "activity_altitude must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Hardware wiring of the host board.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    pub primary_sensor_address: u16,
    /// Second barometer; `None` runs on the primary alone.
    pub secondary_sensor_address: Option<u16>,
    pub enter_pin: u64,
    pub up_pin: u64,
    pub down_pin: u64,
    /// Serial port of the display; `None` logs frames instead.
    pub display_port: Option<String>,
    pub display_baud_rate: u32,
    pub retained_state_path: String,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        HardwareConfig {
            primary_sensor_address: PRIMARY_SENSOR_ADDRESS,
            secondary_sensor_address: Some(SECONDARY_SENSOR_ADDRESS),
            enter_pin: PIN_BUTTON_ENTER,
            up_pin: PIN_BUTTON_UP,
            down_pin: PIN_BUTTON_DOWN,
            display_port: Some("/dev/serial0".to_string()),
            display_baud_rate: DISPLAY_BAUD_RATE,
            retained_state_path: RETAINED_STATE_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Unit system at boot.
    pub units: UnitSystem,
    /// Threshold overrides for metric operation.
    pub metric_thresholds: Option<FlightConfig>,
    /// Threshold overrides for imperial operation.
    pub imperial_thresholds: Option<FlightConfig>,
    pub sample_interval_ms: u64,
    pub climb_rate_window: usize,
    pub inactivity_window_ms: u64,
    pub wake_timer_ms: u64,
    pub menu_enter_hold_ms: u64,
    pub menu_exit_hold_ms: u64,
    pub hardware: HardwareConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            units: UnitSystem::default(),
            metric_thresholds: None,
            imperial_thresholds: None,
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            climb_rate_window: CLIMB_RATE_WINDOW_SIZE,
            inactivity_window_ms: INACTIVITY_WINDOW_MS,
            wake_timer_ms: WAKE_TIMER_MS,
            menu_enter_hold_ms: MENU_ENTER_HOLD_MS,
            menu_exit_hold_ms: MENU_EXIT_HOLD_MS,
            hardware: HardwareConfig::default(),
        }
    }
}

impl DeviceConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, AltimeterError> {
        let text = fs::read_to_string(path)?;
        let config: DeviceConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Thresholds for the given unit system, overrides applied.
    pub fn thresholds(&self, units: UnitSystem) -> FlightConfig {
        let overridden = match units {
            UnitSystem::Metres => self.metric_thresholds,
            UnitSystem::Feet => self.imperial_thresholds,
        };
        overridden.unwrap_or_else(|| FlightConfig::for_units(units))
    }

    pub fn validate(&self) -> Result<(), AltimeterError> {
        self.thresholds(UnitSystem::Metres).validate()?;
        self.thresholds(UnitSystem::Feet).validate()?;
        if self.climb_rate_window == 0 {
            return Err(AltimeterError::InvalidConfig(
                "climb_rate_window must hold at least one rate".into(),
            ));
        }
        if self.wake_timer_ms == 0 {
            return Err(AltimeterError::InvalidConfig(
                "wake_timer_ms must be positive".into(),
            ));
        }
        if self.menu_exit_hold_ms == 0 || self.menu_enter_hold_ms == 0 {
            return Err(AltimeterError::InvalidConfig(
                "menu hold durations must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DeviceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: DeviceConfig =
            serde_json::from_str(r#"{ "units": "feet", "wake_timer_ms": 10000 }"#).unwrap();
        assert_eq!(config.units, UnitSystem::Feet);
        assert_eq!(config.wake_timer_ms, 10_000);
        assert_eq!(config.sample_interval_ms, SAMPLE_INTERVAL_MS);
        assert_eq!(config.hardware.enter_pin, PIN_BUTTON_ENTER);
        assert_eq!(
            config.thresholds(UnitSystem::Feet).launch_altitude,
            LAUNCH_ALTITUDE_FEET
        );
    }

    #[test]
    fn test_threshold_override() {
        let config: DeviceConfig = serde_json::from_str(
            r#"{ "metric_thresholds": {
                "launch_altitude": 80.0, "freefall_rate": -12.0, "canopy_rate": -7.0,
                "landing_altitude": 10.0, "exit_altitude": 4200.0, "activity_altitude": 5.0
            } }"#,
        )
        .unwrap();
        assert_eq!(config.thresholds(UnitSystem::Metres).launch_altitude, 80.0);
        assert_eq!(
            config.thresholds(UnitSystem::Feet),
            FlightConfig::for_units(UnitSystem::Feet)
        );
    }

    #[test]
    fn test_inverted_rates_rejected() {
        let mut thresholds = FlightConfig::for_units(UnitSystem::Metres);
        thresholds.canopy_rate = -20.0;
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn test_feet_conversion() {
        let feet = UnitSystem::Feet.from_metres(FEET_FACTOR * 100.0);
        assert!((feet - 100.0).abs() < 1e-3);
        assert!((UnitSystem::Feet.to_metres(feet) - FEET_FACTOR * 100.0).abs() < 1e-3);
        assert_eq!(UnitSystem::Metres.toggled(), UnitSystem::Feet);
    }
}
