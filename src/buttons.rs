//! Push buttons: raw levels from GPIO and press/hold tracking on top.

use linux_embedded_hal::sysfs_gpio::{Direction, Pin};
use tracing::warn;

use crate::error::AltimeterError;

/// Raw levels of the three buttons, `true` while pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonLevels {
    pub enter: bool,
    pub up: bool,
    pub down: bool,
}

pub trait ButtonInput {
    fn levels(&mut self) -> ButtonLevels;
}

/// Edge and hold tracking for one button.
#[derive(Debug, Clone, Copy, Default)]
pub struct Button {
    pressed: bool,
    changed: bool,
    pressed_since: Option<u64>,
}

impl Button {
    pub fn read(&mut self, level: bool, now_ms: u64) {
        self.changed = level != self.pressed;
        self.pressed = level;
        if self.changed {
            self.pressed_since = level.then_some(now_ms);
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn was_pressed(&self) -> bool {
        self.pressed && self.changed
    }

    pub fn was_released(&self) -> bool {
        !self.pressed && self.changed
    }

    /// Tick the current press started at, while held.
    pub fn pressed_since(&self) -> Option<u64> {
        self.pressed_since
    }

    pub fn pressed_for(&self, duration_ms: u64, now_ms: u64) -> bool {
        self.pressed_since
            .is_some_and(|since| now_ms.saturating_sub(since) >= duration_ms)
    }
}

/// Buttons wired to sysfs GPIO lines, active low with pull-ups.
pub struct GpioButtons {
    enter: Pin,
    up: Pin,
    down: Pin,
}

impl GpioButtons {
    pub fn open(enter_pin: u64, up_pin: u64, down_pin: u64) -> Result<Self, AltimeterError> {
        Ok(GpioButtons {
            enter: open_input(enter_pin)?,
            up: open_input(up_pin)?,
            down: open_input(down_pin)?,
        })
    }
}

/// Exports `number` as an input line.
pub fn open_input(number: u64) -> Result<Pin, AltimeterError> {
    let pin = Pin::new(number);
    pin.export()?;
    pin.set_direction(Direction::In)?;
    Ok(pin)
}

/// Reads an active-low line; a failed read counts as released.
pub fn is_low(pin: &Pin) -> bool {
    match pin.get_value() {
        Ok(value) => value == 0,
        Err(e) => {
            warn!("Failed to read button line: {}", e);
            false
        }
    }
}

impl ButtonInput for GpioButtons {
    fn levels(&mut self) -> ButtonLevels {
        ButtonLevels {
            enter: is_low(&self.enter),
            up: is_low(&self.up),
            down: is_low(&self.down),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release_edges() {
        let mut button = Button::default();
        button.read(false, 0);
        assert!(!button.was_pressed());

        button.read(true, 100);
        assert!(button.was_pressed());
        assert!(button.is_pressed());
        assert_eq!(button.pressed_since(), Some(100));

        button.read(true, 200);
        assert!(!button.was_pressed());
        assert_eq!(button.pressed_since(), Some(100));

        button.read(false, 300);
        assert!(button.was_released());
        assert_eq!(button.pressed_since(), None);
    }

    #[test]
    fn test_pressed_for() {
        let mut button = Button::default();
        button.read(true, 1_000);
        assert!(!button.pressed_for(1_000, 1_999));
        assert!(button.pressed_for(1_000, 2_000));
        button.read(false, 2_100);
        assert!(!button.pressed_for(1_000, 5_000));
    }
}
