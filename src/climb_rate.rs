//! Smoothed climb rate from a rolling window of altitude deltas.

use crate::constants::{MIN_RATE_DT_MS, NOMINAL_CLIMB_RATE};
use fixed_deque::Deque;

/// Rate of altitude change between two samples, in units per second.
///
/// A zero time delta is treated as one tick.
pub fn rate_between(delta_altitude: f32, dt_ms: u64) -> f32 {
    let dt_ms = dt_ms.max(MIN_RATE_DT_MS);
    delta_altitude * 1000.0 / dt_ms as f32
}

pub struct ClimbRateEstimator {
    pub climb_rate: f32,
    interval_ms: u64,
    rate_rolling_average: Deque<f32>,
    last_altitude: Option<f32>,
    last_update_ms: u64,
}

impl ClimbRateEstimator {
    pub fn new(window_size: usize, interval_ms: u64) -> Self {
        ClimbRateEstimator {
            climb_rate: NOMINAL_CLIMB_RATE,
            interval_ms,
            rate_rolling_average: Deque::new(window_size),
            last_altitude: None,
            last_update_ms: 0,
        }
    }

    /// Feeds one altitude sample and returns the published climb rate.
    ///
    /// The first call only primes the estimator. Calls closer than one
    /// interval to the last accepted one return the current rate unchanged.
    pub fn update(&mut self, altitude: f32, now_ms: u64) -> f32 {
        let Some(last_altitude) = self.last_altitude else {
            self.last_altitude = Some(altitude);
            self.last_update_ms = now_ms;
            return self.climb_rate;
        };

        let dt_ms = now_ms.saturating_sub(self.last_update_ms);
        if dt_ms < self.interval_ms {
            return self.climb_rate;
        }

        let rate = rate_between(altitude - last_altitude, dt_ms);
        self.rate_rolling_average.push_back(rate);
        self.last_altitude = Some(altitude);
        self.last_update_ms = now_ms;

        self.climb_rate = self.published_rate();
        self.climb_rate
    }

    /// Forgets all history, e.g. after a unit change or recalibration.
    pub fn reset(&mut self) {
        self.rate_rolling_average.clear();
        self.last_altitude = None;
        self.last_update_ms = 0;
        self.climb_rate = NOMINAL_CLIMB_RATE;
    }

    /// Seconds until `target` is reached at the current rate, if it is ahead.
    pub fn time_to_altitude(&self, current: f32, target: f32) -> Option<u32> {
        let seconds = (target - current) / self.climb_rate;
        (seconds.is_finite() && seconds > 0.0).then(|| seconds as u32)
    }

    fn published_rate(&self) -> f32 {
        if self.rate_rolling_average.len() == 0 {
            return NOMINAL_CLIMB_RATE;
        }
        let mean = self.rate_rolling_average.iter().sum::<f32>()
            / self.rate_rolling_average.len() as f32;
        if mean == 0.0 { NOMINAL_CLIMB_RATE } else { mean }
    }
}
