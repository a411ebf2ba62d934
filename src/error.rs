//! Errors raised by the host plumbing around the flight engine.
//!
//! The engine itself never fails: numeric hazards are coerced and sensor
//! faults hold the last value. These errors only come from bring-up and
//! storage on the host board.

use crate::state::FlightPhase;

#[derive(Debug, thiserror::Error)]
pub enum AltimeterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Pressure sensor at 0x{0:02X} did not come up")]
    SensorUnavailable(u16),

    #[error("GPIO error: {0}")]
    Gpio(#[from] linux_embedded_hal::sysfs_gpio::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raised when a transition outside the phase table is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("Illegal transition {from} -> {to}")]
    IllegalTransition { from: FlightPhase, to: FlightPhase },
}
