//! Mapping of normalized control signals to pointer motion.
//!
//! Three motion models share one mapper and one (x, y) memory that survives
//! mode switches; each mode reinterprets it. The mapper emits
//! [`PointerMotion`] commands instead of touching the OS, so the state
//! machine is testable and the actual injection stays behind the
//! [`crate::devices::PointerDevice`] capability.

use crate::{
    constants::{
        DEFAULT_DEADZONE, DEFAULT_JOYSTICK_THRESHOLD, DEFAULT_MAX_SPEED, DEFAULT_SPEED_ACCELERATION,
        DEFAULT_SPEED_BASE, REFERENCE_DISPLAY_WIDTH_PX,
    },
    projection::Monitor,
    Error, Result,
};
use nalgebra::Vector2;

/// Pointer motion model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionMode {
    /// Pointer position follows the signal pair directly
    Absolute,
    /// Signal deltas drive accelerated incremental movement
    Relative,
    /// Deflection beyond a threshold drives constant-rate movement
    Joystick,
}

impl MotionMode {
    /// Next mode in the fixed cycle {Absolute, Relative, Joystick}
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Absolute => Self::Relative,
            Self::Relative => Self::Joystick,
            Self::Joystick => Self::Absolute,
        }
    }

    /// Previous mode in the cycle
    #[must_use]
    pub fn prev(self) -> Self {
        match self {
            Self::Absolute => Self::Joystick,
            Self::Relative => Self::Absolute,
            Self::Joystick => Self::Relative,
        }
    }
}

/// One pointer command produced for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerMotion {
    /// Absolute pixel position
    MoveTo(i32, i32),
    /// Incremental pixel move
    MoveBy(i32, i32),
}

/// Exponential speed curve shared by the relative and joystick modes.
///
/// `evaluate` maps a signed input through
/// `min(base^(|input| * acceleration), max_speed) - 1`, keeps the input's
/// sign and returns zero inside the deadzone. The subtraction anchors a
/// zero input at zero speed.
#[derive(Debug, Clone, Copy)]
pub struct SpeedCurve {
    base: f64,
    acceleration: f64,
    max_speed: f64,
    deadzone: f64,
}

impl SpeedCurve {
    /// # Errors
    ///
    /// Rejects a base not above 1, a non-positive acceleration or max
    /// speed, or a negative deadzone.
    pub fn new(base: f64, acceleration: f64, max_speed: f64, deadzone: f64) -> Result<Self> {
        if base <= 1.0 {
            return Err(Error::Config(format!("Speed curve base must exceed 1, got {base}")));
        }
        if acceleration <= 0.0 || max_speed <= 0.0 {
            return Err(Error::Config(
                "Speed curve acceleration and max speed must be positive".to_string(),
            ));
        }
        if deadzone < 0.0 {
            return Err(Error::Config(format!("Deadzone must be non-negative, got {deadzone}")));
        }
        Ok(Self {
            base,
            acceleration,
            max_speed,
            deadzone,
        })
    }

    /// Signed speed for a signed input
    #[must_use]
    pub fn evaluate(&self, input: f64) -> f64 {
        let magnitude = input.abs();
        if magnitude <= self.deadzone {
            return 0.0;
        }
        let speed = self.base.powf(magnitude * self.acceleration).min(self.max_speed) - 1.0;
        speed.copysign(input)
    }
}

impl Default for SpeedCurve {
    fn default() -> Self {
        Self {
            base: DEFAULT_SPEED_BASE,
            acceleration: DEFAULT_SPEED_ACCELERATION,
            max_speed: DEFAULT_MAX_SPEED,
            deadzone: DEFAULT_DEADZONE,
        }
    }
}

/// Converts a normalized signal pair into pointer motion under the
/// selected mode.
#[derive(Debug)]
pub struct MotionMapper {
    mode: MotionMode,
    monitor: Monitor,
    curve: SpeedCurve,
    joystick_threshold: f64,
    invert_x: bool,
    invert_y: bool,
    // Mode-local (x, y) memory; kept across mode switches
    last: Option<Vector2<f64>>,
}

impl MotionMapper {
    /// # Errors
    ///
    /// Rejects a joystick threshold outside (0, 0.5).
    pub fn new(mode: MotionMode, monitor: Monitor, curve: SpeedCurve, joystick_threshold: f64) -> Result<Self> {
        if !(0.0..0.5).contains(&joystick_threshold) || joystick_threshold == 0.0 {
            return Err(Error::Config(format!(
                "Joystick threshold must be in (0, 0.5), got {joystick_threshold}"
            )));
        }
        Ok(Self {
            mode,
            monitor,
            curve,
            joystick_threshold,
            invert_x: false,
            invert_y: false,
            last: None,
        })
    }

    /// Mapper with default curve and threshold
    ///
    /// # Errors
    ///
    /// Never fails with the built-in defaults; kept fallible for parity
    /// with [`MotionMapper::new`].
    pub fn with_defaults(mode: MotionMode, monitor: Monitor) -> Result<Self> {
        Self::new(mode, monitor, SpeedCurve::default(), DEFAULT_JOYSTICK_THRESHOLD)
    }

    pub fn set_inversion(&mut self, invert_x: bool, invert_y: bool) {
        self.invert_x = invert_x;
        self.invert_y = invert_y;
    }

    #[must_use]
    pub fn mode(&self) -> MotionMode {
        self.mode
    }

    /// Switch modes directly; the (x, y) memory carries over.
    pub fn set_mode(&mut self, mode: MotionMode) {
        self.mode = mode;
    }

    /// Cycle to the next mode
    pub fn next_mode(&mut self) {
        self.mode = self.mode.next();
    }

    /// Cycle to the previous mode
    pub fn prev_mode(&mut self) {
        self.mode = self.mode.prev();
    }

    /// Feed the normalized signal pair for one frame.
    ///
    /// Returns the pointer command for this frame, or `None` when the
    /// frame produces no movement.
    pub fn update(&mut self, x: f64, y: f64) -> Option<PointerMotion> {
        let x = if self.invert_x { 1.0 - x } else { x };
        let y = if self.invert_y { 1.0 - y } else { y };
        let current = Vector2::new(x, y);
        let previous = self.last.replace(current).unwrap_or(current);

        match self.mode {
            MotionMode::Absolute => {
                let px = (x.clamp(0.0, 1.0) * self.monitor.width_px()).round() as i32;
                let py = (y.clamp(0.0, 1.0) * self.monitor.height_px()).round() as i32;
                Some(PointerMotion::MoveTo(px, py))
            }
            MotionMode::Relative => {
                let delta = current - previous;
                self.emit_move_by(self.curve.evaluate(delta.x), self.curve.evaluate(delta.y))
            }
            MotionMode::Joystick => {
                let dx = self.joystick_speed(x);
                let dy = self.joystick_speed(y);
                self.emit_move_by(dx, dy)
            }
        }
    }

    /// Constant-rate speed for one axis deflected past the threshold.
    fn joystick_speed(&self, value: f64) -> f64 {
        let deviation = value - 0.5;
        if deviation.abs() <= self.joystick_threshold {
            return 0.0;
        }
        let effective = deviation.abs() - self.joystick_threshold;
        self.curve.evaluate(effective).copysign(deviation)
    }

    fn emit_move_by(&self, speed_x: f64, speed_y: f64) -> Option<PointerMotion> {
        // Speeds are tuned in pixels per frame on a reference-width display
        let scale = self.monitor.width_px() / REFERENCE_DISPLAY_WIDTH_PX;
        let dx = (speed_x * scale).round() as i32;
        let dy = (speed_y * scale).round() as i32;
        if dx == 0 && dy == 0 {
            None
        } else {
            Some(PointerMotion::MoveBy(dx, dy))
        }
    }
}
