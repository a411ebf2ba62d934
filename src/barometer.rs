use bmp280::{Bmp280, Bmp280Builder};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::altitude::PressureSensor;
use crate::error::AltimeterError;

/// A BMP280 on the I2C bus.
pub struct Bmp280Barometer {
    address: u16,
    bmp280: Bmp280,
    last_pressure_hpa: f32,
}

impl Bmp280Barometer {
    /// Brings the sensor up, retrying for `attempts` tries since the bus
    /// sometimes needs a moment after power-on.
    pub fn connect(address: u16, attempts: u32) -> Result<Self, AltimeterError> {
        for attempt in 1..=attempts {
            if let Ok(bmp280) = Bmp280Builder::new().address(address).build() {
                info!("BMP280 at 0x{:02X} initialized.", address);
                let mut barometer = Bmp280Barometer {
                    address,
                    bmp280,
                    last_pressure_hpa: 0.0,
                };
                // Prime the held value so a first failed read has something to report.
                barometer.read_pressure_hpa();
                return Ok(barometer);
            }
            info!(
                "Waiting for BMP280 at 0x{:02X} to be ready ({}/{})...",
                address, attempt, attempts
            );
            thread::sleep(Duration::from_millis(500));
        }
        Err(AltimeterError::SensorUnavailable(address))
    }
}

impl PressureSensor for Bmp280Barometer {
    /// If the read fails, the old value is kept.
    fn read_pressure_hpa(&mut self) -> f32 {
        match self.bmp280.pressure_kpa() {
            Ok(pressure) => self.last_pressure_hpa = pressure * 10.0,
            Err(_) => warn!("Failed to read pressure from BMP280 at 0x{:02X}", self.address),
        }
        self.last_pressure_hpa
    }
}
