//! Hands-free pointer control from facial landmark streams.
//!
//! An external tracker delivers facial landmark positions once per frame;
//! this library turns them into smoothed, normalized control signals that
//! drive pointer motion and fire discrete actions (clicks, key presses).
//! The processing chain per frame:
//!
//! 1. Head pose estimation from the landmarks (PnP fit, Procrustes
//!    alignment, or an externally supplied pose)
//! 2. Projection of the head forward direction onto the display plane
//! 3. Projective-invariant facial measures (jaw-open, mouth-pucker,
//!    brow-raise, smile)
//! 4. Recursive Kalman smoothing of every raw quantity
//! 5. Normalization into [0, 1] per named signal and level-triggered
//!    action dispatch
//! 6. Pointer motion under an absolute, relative or joystick model
//!
//! Video capture, the landmark detector and OS input injection stay
//! outside; injection is a capability trait the caller implements.
//!
//! # Examples
//!
//! ```no_run
//! use gesture_pointer::{
//!     app::GestureEngine,
//!     config::Config,
//!     devices::{KeyboardDevice, LoggingKeyboard, LoggingPointer, PointerDevice},
//! };
//! use std::sync::{Arc, Mutex};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_file("config/default.yaml")?;
//! let pointer: Arc<Mutex<dyn PointerDevice>> = Arc::new(Mutex::new(LoggingPointer));
//! let keyboard: Arc<Mutex<dyn KeyboardDevice>> = Arc::new(Mutex::new(LoggingKeyboard));
//! let mut engine = GestureEngine::from_config(&config, pointer, keyboard)?;
//! engine.set_motion_enabled(true);
//! // engine.run(&mut landmark_source)?;
//! # Ok(())
//! # }
//! ```
//!
//! Driving a single signal by hand:
//!
//! ```
//! use gesture_pointer::signal::{Action, ActionId, Signal};
//!
//! let mut signal = Signal::new("JawOpen");
//! signal.set_thresholds(Some(0.4), Some(0.55)).unwrap();
//! signal.set_filter_strength(0.001);
//!
//! let mut action = Action::new(0.5);
//! action.set_up_action(|| println!("jaw opened"));
//! signal.add_action(ActionId::new(1), action);
//!
//! signal.set_value(0.58);
//! assert!(signal.scaled_value() >= 0.0 && signal.scaled_value() <= 1.0);
//! ```

/// Landmark set and camera intrinsics types
pub mod landmarks;

/// Recursive smoothing filters and filtered-value wrappers
pub mod filters;

/// Projective-invariant geometric feature extraction
pub mod features;

/// Head pose estimation strategies
pub mod pose;

/// Screen projection and monitor geometry
pub mod projection;

/// Named signals and level-triggered actions
pub mod signal;

/// Motion models mapping signals to pointer commands
pub mod motion;

/// Per-frame pipeline orchestration
pub mod pipeline;

/// Injected pointer/keyboard capabilities
pub mod devices;

/// Configuration management
pub mod config;

/// Engine driving the pipeline from a landmark source
pub mod app;

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

pub use error::{Error, Result};
