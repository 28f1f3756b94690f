//! Injected input-device capabilities.
//!
//! The pipeline never talks to the OS directly; pointer and keyboard
//! injection are traits the caller supplies. The logging implementations
//! here back the replay binary and deterministic tests.

use crate::motion::PointerMotion;
use log::{debug, info};

/// Mouse buttons understood by the pointer capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Pointer injection capability
pub trait PointerDevice: Send {
    /// Set the absolute pointer position in pixels
    fn move_to(&mut self, x: i32, y: i32);

    /// Move the pointer relative to its current position
    fn move_by(&mut self, dx: i32, dy: i32);

    fn click(&mut self, button: MouseButton);

    fn double_click(&mut self, button: MouseButton);

    /// Apply one mapper command
    fn apply(&mut self, motion: PointerMotion) {
        match motion {
            PointerMotion::MoveTo(x, y) => self.move_to(x, y),
            PointerMotion::MoveBy(dx, dy) => self.move_by(dx, dy),
        }
    }
}

/// Keyboard injection capability; keys are named strings ("a", "ctrl", ...)
pub trait KeyboardDevice: Send {
    fn press(&mut self, key: &str);

    fn release(&mut self, key: &str);
}

/// Pointer that logs every command instead of injecting it
#[derive(Debug, Default)]
pub struct LoggingPointer;

impl PointerDevice for LoggingPointer {
    fn move_to(&mut self, x: i32, y: i32) {
        debug!("pointer move_to ({x}, {y})");
    }

    fn move_by(&mut self, dx: i32, dy: i32) {
        debug!("pointer move_by ({dx}, {dy})");
    }

    fn click(&mut self, button: MouseButton) {
        info!("pointer click {button:?}");
    }

    fn double_click(&mut self, button: MouseButton) {
        info!("pointer double_click {button:?}");
    }
}

/// Keyboard that logs every key event instead of injecting it
#[derive(Debug, Default)]
pub struct LoggingKeyboard;

impl KeyboardDevice for LoggingKeyboard {
    fn press(&mut self, key: &str) {
        info!("keyboard press '{key}'");
    }

    fn release(&mut self, key: &str) {
        info!("keyboard release '{key}'");
    }
}

/// Pointer that records every command, for tests and replay summaries
#[derive(Debug, Default)]
pub struct RecordingPointer {
    pub motions: Vec<PointerMotion>,
    pub clicks: Vec<MouseButton>,
}

impl PointerDevice for RecordingPointer {
    fn move_to(&mut self, x: i32, y: i32) {
        self.motions.push(PointerMotion::MoveTo(x, y));
    }

    fn move_by(&mut self, dx: i32, dy: i32) {
        self.motions.push(PointerMotion::MoveBy(dx, dy));
    }

    fn click(&mut self, button: MouseButton) {
        self.clicks.push(button);
    }

    fn double_click(&mut self, button: MouseButton) {
        self.clicks.push(button);
        self.clicks.push(button);
    }
}

/// Keyboard that records every key event
#[derive(Debug, Default)]
pub struct RecordingKeyboard {
    pub events: Vec<(String, bool)>,
}

impl KeyboardDevice for RecordingKeyboard {
    fn press(&mut self, key: &str) {
        self.events.push((key.to_string(), true));
    }

    fn release(&mut self, key: &str) {
        self.events.push((key.to_string(), false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_routes_commands() {
        let mut pointer = RecordingPointer::default();
        pointer.apply(PointerMotion::MoveTo(10, 20));
        pointer.apply(PointerMotion::MoveBy(-3, 4));
        assert_eq!(
            pointer.motions,
            vec![PointerMotion::MoveTo(10, 20), PointerMotion::MoveBy(-3, 4)]
        );
    }

    #[test]
    fn test_double_click_records_twice() {
        let mut pointer = RecordingPointer::default();
        pointer.double_click(MouseButton::Left);
        assert_eq!(pointer.clicks.len(), 2);
    }
}
