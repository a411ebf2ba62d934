//! Altitude above the ground baseline, from one or two barometers.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::UnitSystem;

/// Anything that can report ambient pressure.
///
/// Implementations never fail: a sensor that cannot be read reports its last
/// good value.
pub trait PressureSensor {
    /// Ambient pressure in hPa.
    fn read_pressure_hpa(&mut self) -> f32;

    /// Altitude in metres relative to `baseline_hpa`.
    fn read_altitude_m(&mut self, baseline_hpa: f32) -> f32 {
        pressure_to_altitude_m(self.read_pressure_hpa(), baseline_hpa)
    }
}

/// International barometric formula.
pub fn pressure_to_altitude_m(pressure_hpa: f32, baseline_hpa: f32) -> f32 {
    if baseline_hpa <= 0.0 || pressure_hpa <= 0.0 {
        return 0.0;
    }
    44_330.0 * (1.0 - (pressure_hpa / baseline_hpa).powf(0.1903))
}

/// Zero-altitude reference, one value per fitted sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselinePressure {
    pub primary_hpa: f32,
    pub secondary_hpa: Option<f32>,
}

/// Filtered altitude in the active unit system and the tick it was read at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeSample {
    pub altitude: f32,
    pub taken_at_ms: u64,
}

pub struct AltitudeFilter<P> {
    primary: P,
    secondary: Option<P>,
    units: UnitSystem,
    interval_ms: u64,
    last_sample: Option<AltitudeSample>,
}

impl<P: PressureSensor> AltitudeFilter<P> {
    pub fn new(primary: P, secondary: Option<P>, units: UnitSystem, interval_ms: u64) -> Self {
        AltitudeFilter {
            primary,
            secondary,
            units,
            interval_ms,
            last_sample: None,
        }
    }

    /// Reads the current ambient pressure of every sensor as the new zero.
    pub fn calibrate(&mut self) -> BaselinePressure {
        self.last_sample = None;
        let baseline = BaselinePressure {
            primary_hpa: self.primary.read_pressure_hpa(),
            secondary_hpa: self.secondary.as_mut().map(|s| s.read_pressure_hpa()),
        };
        debug!(
            "Calibrated baseline: {} hPa / {:?} hPa",
            baseline.primary_hpa, baseline.secondary_hpa
        );
        baseline
    }

    /// Returns the altitude above `baseline`.
    ///
    /// Within `interval_ms` of the previous read the cached sample is returned
    /// and no sensor is touched.
    pub fn sample(&mut self, baseline: &BaselinePressure, now_ms: u64) -> AltitudeSample {
        if let Some(last) = self.last_sample {
            if now_ms.saturating_sub(last.taken_at_ms) < self.interval_ms {
                return last;
            }
        }

        let primary_m = self.primary.read_altitude_m(baseline.primary_hpa);
        let altitude_m = match self.secondary.as_mut() {
            Some(secondary) => {
                let secondary_baseline = baseline.secondary_hpa.unwrap_or(baseline.primary_hpa);
                (primary_m + secondary.read_altitude_m(secondary_baseline)) / 2.0
            }
            None => primary_m,
        };

        let sample = AltitudeSample {
            altitude: self.units.from_metres(altitude_m),
            taken_at_ms: now_ms,
        };
        self.last_sample = Some(sample);
        sample
    }

    pub fn last_sample(&self) -> Option<AltitudeSample> {
        self.last_sample
    }

    pub fn units(&self) -> UnitSystem {
        self.units
    }

    /// Switches the output unit system. The cached sample is dropped so the
    /// next call reads fresh in the new units.
    pub fn set_units(&mut self, units: UnitSystem) {
        self.units = units;
        self.last_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ScriptedBarometer;

    fn baseline() -> BaselinePressure {
        BaselinePressure {
            primary_hpa: 1013.25,
            secondary_hpa: Some(1013.25),
        }
    }

    #[test]
    fn test_pressure_to_altitude() {
        assert_eq!(pressure_to_altitude_m(1013.25, 1013.25), 0.0);
        // About 8.3 m per hPa near sea level.
        let one_hpa = pressure_to_altitude_m(1012.25, 1013.25);
        assert!(one_hpa > 8.0 && one_hpa < 8.6);
        assert_eq!(pressure_to_altitude_m(1000.0, 0.0), 0.0);
    }

    #[test]
    fn test_two_sensors_are_averaged() {
        let primary = ScriptedBarometer::new(100.0);
        let secondary = ScriptedBarometer::new(110.0);
        let mut filter = AltitudeFilter::new(primary, Some(secondary), UnitSystem::Metres, 200);
        let sample = filter.sample(&baseline(), 0);
        assert!((sample.altitude - 105.0).abs() < 1e-3);
    }

    #[test]
    fn test_single_sensor_used_directly() {
        let primary = ScriptedBarometer::new(42.0);
        let mut filter = AltitudeFilter::new(primary, None, UnitSystem::Metres, 200);
        assert!((filter.sample(&baseline(), 0).altitude - 42.0).abs() < 1e-3);
    }

    #[test]
    fn test_sample_is_rate_limited() {
        let primary = ScriptedBarometer::new(10.0);
        let handle = primary.clone();
        let mut filter = AltitudeFilter::new(primary, None, UnitSystem::Metres, 200);

        let first = filter.sample(&baseline(), 1_000);
        handle.set_altitude(20.0);
        let cached = filter.sample(&baseline(), 1_150);
        assert_eq!(first, cached);
        assert_eq!(handle.reads(), 1);

        let fresh = filter.sample(&baseline(), 1_200);
        assert!((fresh.altitude - 20.0).abs() < 1e-3);
        assert_eq!(fresh.taken_at_ms, 1_200);
        assert_eq!(handle.reads(), 2);
    }

    #[test]
    fn test_feet_output() {
        let primary = ScriptedBarometer::new(30.48);
        let mut filter = AltitudeFilter::new(primary, None, UnitSystem::Feet, 200);
        assert!((filter.sample(&baseline(), 0).altitude - 100.0).abs() < 1e-2);
    }

    #[test]
    fn test_calibrate_reads_every_sensor() {
        let primary = ScriptedBarometer::with_pressure(1001.0);
        let secondary = ScriptedBarometer::with_pressure(1002.0);
        let mut filter = AltitudeFilter::new(primary, Some(secondary), UnitSystem::Metres, 200);
        let baseline = filter.calibrate();
        assert_eq!(baseline.primary_hpa, 1001.0);
        assert_eq!(baseline.secondary_hpa, Some(1002.0));
    }
}
