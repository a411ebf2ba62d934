//! Flight-phase engine of a skydiving altimeter.
//!
//! Barometric altitude goes in, the wearer's phase of the jump comes out:
//! on the ground, climbing in the aircraft, in freefall or under canopy.
//! While grounded and idle the device suspends, waking periodically to check
//! whether the aircraft has taken off.

pub mod altitude;
pub mod barometer;
pub mod buttons;
pub mod climb_rate;
pub mod clock;
pub mod config;
pub mod constants;
pub mod context;
pub mod display;
pub mod error;
pub mod power;
pub mod retained;
pub mod sim;
pub mod sleep;
pub mod state;
