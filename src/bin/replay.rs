//! Replays a recorded altitude trace through the flight engine.
//!
//! The trace is a text file of `time_ms,altitude_m` lines; `#` starts a
//! comment. Suspensions skip the trace forward by the wake timer, the way
//! the device would sleep through that stretch of the recording.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use tracing::info;

use jump_altimeter::config::DeviceConfig;
use jump_altimeter::context::{Peripherals, SessionEnd, run_session};
use jump_altimeter::display::LogDisplay;
use jump_altimeter::sim::{ManualClock, MemoryRetained, ScriptedBarometer, ScriptedButtons, SimPower};

#[derive(Parser)]
#[command(about = "Replay an altitude trace through the flight-phase engine")]
struct Args {
    /// Trace file of `time_ms,altitude_m` lines.
    trace: PathBuf,

    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated time between two control cycles.
    #[arg(long, default_value_t = 200)]
    step_ms: u64,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn load_trace(path: &Path) -> Result<Vec<(u64, f32)>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read trace {}", path.display()))?;
    let mut trace = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((time, altitude)) = line.split_once(',') else {
            bail!("Line {}: expected `time_ms,altitude_m`", number + 1);
        };
        let time: u64 = time.trim().parse().with_context(|| format!("Line {}", number + 1))?;
        let altitude: f32 = altitude
            .trim()
            .parse()
            .with_context(|| format!("Line {}", number + 1))?;
        trace.push((time, altitude));
    }
    if trace.is_empty() {
        bail!("Trace {} holds no samples", path.display());
    }
    trace.sort_by_key(|(time, _)| *time);
    Ok(trace)
}

/// Linear interpolation between the surrounding trace points.
fn altitude_at(trace: &[(u64, f32)], time_ms: u64) -> f32 {
    let after = trace.partition_point(|(time, _)| *time <= time_ms);
    match (after.checked_sub(1).map(|i| trace[i]), trace.get(after)) {
        (Some((t0, a0)), Some(&(t1, a1))) => {
            let fraction = (time_ms - t0) as f32 / (t1 - t0) as f32;
            a0 + (a1 - a0) * fraction
        }
        (Some((_, a0)), None) => a0,
        (None, Some(&(_, a1))) => a1,
        (None, None) => 0.0,
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.log_level).init();

    let config = match &args.config {
        Some(path) => DeviceConfig::load(path)?,
        None => DeviceConfig::default(),
    };
    let trace = load_trace(&args.trace)?;
    let end_ms = trace[trace.len() - 1].0;

    let barometer = ScriptedBarometer::new(altitude_at(&trace, 0));
    let mut power = SimPower::new();
    let mut retained = MemoryRetained::default();
    let mut trace_ms = 0;

    loop {
        let clock = ManualClock::default();
        barometer.set_altitude(altitude_at(&trace, trace_ms));
        let peripherals = Peripherals {
            primary: barometer.clone(),
            secondary: None,
            buttons: ScriptedButtons::default(),
            display: LogDisplay,
        };

        let end = run_session(&config, peripherals, &clock, &mut power, &mut retained, || {
            trace_ms += args.step_ms;
            clock.advance(args.step_ms);
            barometer.set_altitude(altitude_at(&trace, trace_ms));
            trace_ms <= end_ms
        })?;

        if end == SessionEnd::Stopped {
            break;
        }
        trace_ms += config.wake_timer_ms;
        if trace_ms > end_ms {
            break;
        }
    }

    info!(
        "Replayed {} ms of trace with {} suspensions",
        end_ms,
        power.suspensions().len()
    );
    Ok(())
}
