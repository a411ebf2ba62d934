use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::{info, warn};

use jump_altimeter::barometer::Bmp280Barometer;
use jump_altimeter::buttons::GpioButtons;
use jump_altimeter::clock::SystemClock;
use jump_altimeter::config::DeviceConfig;
use jump_altimeter::constants::CYCLE_PAUSE_MS;
use jump_altimeter::context::{Peripherals, run_session};
use jump_altimeter::display::{Display, LogDisplay, SerialDisplay};
use jump_altimeter::power::HostPower;
use jump_altimeter::retained::FileRetained;

const SENSOR_ATTEMPTS: u32 = 10;
/// The second sensor is optional, so don't hold up every wake-up for it.
const SECONDARY_SENSOR_ATTEMPTS: u32 = 2;
const WAKE_POLL_MS: u64 = 50;

#[derive(Parser)]
#[command(version, about = "Skydiving altimeter: flight phase from barometric altitude")]
struct Args {
    /// JSON configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    let config = match &args.config {
        Some(path) => DeviceConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DeviceConfig::default(),
    };

    let mut power = HostPower::new(Duration::from_millis(WAKE_POLL_MS));
    let mut retained = FileRetained::new(&config.hardware.retained_state_path);

    // Every pass is one power session: peripherals are brought up again
    // and only the retained snapshot carries over.
    loop {
        let peripherals = open_peripherals(&config)?;
        let clock = SystemClock::new();
        run_session(&config, peripherals, &clock, &mut power, &mut retained, || {
            thread::sleep(Duration::from_millis(CYCLE_PAUSE_MS));
            true
        })?;
    }
}

fn open_peripherals(
    config: &DeviceConfig,
) -> Result<Peripherals<Bmp280Barometer, GpioButtons, Box<dyn Display>>> {
    let hardware = &config.hardware;
    let primary = Bmp280Barometer::connect(hardware.primary_sensor_address, SENSOR_ATTEMPTS)
        .context("Primary pressure sensor is required")?;

    let secondary = hardware.secondary_sensor_address.and_then(|address| {
        Bmp280Barometer::connect(address, SECONDARY_SENSOR_ATTEMPTS)
            .inspect_err(|e| warn!("{}. Continuing with one sensor.", e))
            .ok()
    });

    let buttons = GpioButtons::open(hardware.enter_pin, hardware.up_pin, hardware.down_pin)
        .context("Failed to set up buttons")?;

    let display: Box<dyn Display> = match &hardware.display_port {
        Some(path) => match SerialDisplay::open(path, hardware.display_baud_rate) {
            Ok(display) => Box::new(display),
            Err(e) => {
                warn!("Display on {} unavailable: {}. Logging frames instead.", path, e);
                Box::new(LogDisplay)
            }
        },
        None => {
            info!("No display configured, logging frames.");
            Box::new(LogDisplay)
        }
    };

    Ok(Peripherals {
        primary,
        secondary,
        buttons,
        display,
    })
}
