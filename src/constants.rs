//! Constants used throughout the library.
//!
//! Landmark indices follow the MediaPipe face-mesh convention (468 points,
//! 478 with iris refinement).

/// Minimum number of landmarks the pipeline accepts per frame
pub const MIN_LANDMARKS: usize = 468;

/// Nose tip landmark index
pub const LM_NOSE_TIP: usize = 1;

/// Moving chin landmark used for the jaw-open measure
pub const LM_CHIN: usize = 18;

/// Top-of-head landmark (head-height normalization pair, upper)
pub const LM_CROWN: usize = 10;

/// Forehead landmark (head-height normalization pair, lower)
pub const LM_FOREHEAD: usize = 151;

/// Upper-lip landmark used for the mouth-pucker measure
pub const LM_MOUTH_UPPER: usize = 302;

/// Lower reference landmark used for the mouth-pucker measure
pub const LM_MOUTH_LOWER: usize = 72;

/// Glabella landmark (between the brows), moves with brow raises
pub const LM_GLABELLA: usize = 9;

/// Nose bridge landmark on the face midline
pub const LM_NOSE_BRIDGE: usize = 168;

/// Chin-bottom landmark (stable midline reference)
pub const LM_CHIN_BOTTOM: usize = 152;

/// Eye outer corners and mouth corners for the smile measure
pub const LM_LEFT_EYE_OUTER: usize = 33;
pub const LM_RIGHT_EYE_OUTER: usize = 263;
pub const LM_LEFT_MOUTH_CORNER: usize = 61;
pub const LM_RIGHT_MOUTH_CORNER: usize = 291;

/// Fixed process noise of the recursive smoothing filter
pub const KALMAN_PROCESS_NOISE: f64 = 1e-5;

/// Initial estimate uncertainty of the recursive smoothing filter
pub const KALMAN_INITIAL_UNCERTAINTY: f64 = 1.0;

/// Default smoothing strength applied to the projected screen point
pub const DEFAULT_SCREEN_FILTER_STRENGTH: f64 = 0.022;

/// Canonical face model units (cm) to monitor units (mm)
pub const POSE_UNITS_TO_MM: f64 = 10.0;

/// Vertical offset of a built-in laptop camera above the display, mm
pub const CAMERA_OFFSET_Y_MM: f64 = 9.5;

/// Rays closer to parallel with the display plane than this are rejected
pub const PROJECTION_EPSILON: f64 = 1e-6;

/// Reference display width the relative/joystick speed curves are tuned on
pub const REFERENCE_DISPLAY_WIDTH_PX: f64 = 1920.0;

/// Default exponential speed-curve parameters for relative/joystick motion
pub const DEFAULT_SPEED_BASE: f64 = 2.0;
pub const DEFAULT_SPEED_ACCELERATION: f64 = 25.0;
pub const DEFAULT_MAX_SPEED: f64 = 24.0;
pub const DEFAULT_DEADZONE: f64 = 0.004;
pub const DEFAULT_JOYSTICK_THRESHOLD: f64 = 0.15;

/// Levenberg-Marquardt iteration cap for the PnP refinement
pub const PNP_MAX_ITERATIONS: usize = 40;

/// Convergence threshold on the parameter step of the PnP refinement
pub const PNP_STEP_EPSILON: f64 = 1e-9;

/// Numeric precision epsilon for degeneracy guards
pub const EPSILON: f64 = 1e-10;
