//! Telemetry handed to the display, and the display adapters.

use std::io::Write;
use std::time::Duration;

use serialport::SerialPort;
use tracing::{info, warn};

use crate::config::UnitSystem;
use crate::constants::FREEFALL_DISPLAY_STEP;
use crate::error::AltimeterError;
use crate::state::FlightPhase;

/// Everything the display needs to draw one screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub phase: FlightPhase,
    pub altitude: f32,
    pub climb_rate: f32,
    /// Seconds to exit altitude while climbing.
    pub time_to_exit_s: Option<u32>,
    pub units: UnitSystem,
    pub baseline_hpa: f32,
}

impl Frame {
    /// Altitude as shown: whole units, stepped down in freefall so the
    /// digits stay readable.
    pub fn display_altitude(&self) -> i32 {
        let altitude = self.altitude.round() as i32;
        match self.phase {
            FlightPhase::Freefall => altitude - altitude.rem_euclid(FREEFALL_DISPLAY_STEP),
            _ => altitude,
        }
    }

    pub fn climb_rate_per_minute(&self) -> i32 {
        (self.climb_rate * 60.0).round() as i32
    }

    /// One comma separated line, prefixed with the wall clock time.
    pub fn to_line(&self, wall_clock: &str) -> String {
        let time_to_exit = self
            .time_to_exit_s
            .map(|s| format!("{}:{:02}", s / 60, s % 60))
            .unwrap_or_default();
        format!(
            "{},{},{},{},{},{},{:.2}\n",
            wall_clock,
            self.phase.name(),
            self.display_altitude(),
            self.units.label(),
            self.climb_rate_per_minute(),
            time_to_exit,
            self.baseline_hpa
        )
    }
}

pub trait Display {
    fn render(&mut self, frame: &Frame);
    /// Called right before the device suspends.
    fn power_save(&mut self);
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn render(&mut self, frame: &Frame) {
        (**self).render(frame);
    }

    fn power_save(&mut self) {
        (**self).power_save();
    }
}

fn wall_clock() -> String {
    chrono::Utc::now().format("%d.%m.%Y %H:%M").to_string()
}

/// Line display on a serial port.
pub struct SerialDisplay {
    port: Box<dyn SerialPort>,
}

impl SerialDisplay {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, AltimeterError> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;
        Ok(SerialDisplay { port })
    }
}

impl Display for SerialDisplay {
    fn render(&mut self, frame: &Frame) {
        let line = frame.to_line(&wall_clock());
        if let Err(e) = self.port.write_all(line.as_bytes()) {
            warn!("Failed to write to display: {}", e);
        }
    }

    fn power_save(&mut self) {
        if let Err(e) = self.port.write_all(b"SLEEP\n").and_then(|_| self.port.flush()) {
            warn!("Failed to power down display: {}", e);
        }
    }
}

/// Stand-in used when no display is attached: frames go to the log.
pub struct LogDisplay;

impl Display for LogDisplay {
    fn render(&mut self, frame: &Frame) {
        info!("{}", frame.to_line(&wall_clock()).trim_end());
    }

    fn power_save(&mut self) {
        info!("Display power save");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(phase: FlightPhase, altitude: f32) -> Frame {
        Frame {
            phase,
            altitude,
            climb_rate: 4.5,
            time_to_exit_s: None,
            units: UnitSystem::Metres,
            baseline_hpa: 1013.25,
        }
    }

    #[test]
    fn test_freefall_altitude_is_stepped() {
        assert_eq!(frame(FlightPhase::Freefall, 2_987.4).display_altitude(), 2_950);
        assert_eq!(frame(FlightPhase::Canopy, 987.4).display_altitude(), 987);
    }

    #[test]
    fn test_line_format() {
        let mut climbing = frame(FlightPhase::Climb, 1_200.2);
        climbing.time_to_exit_s = Some(125);
        assert_eq!(
            climbing.to_line("18.10.2026 09:30"),
            "18.10.2026 09:30,Climb,1200,m,270,2:05,1013.25\n"
        );
    }
}
