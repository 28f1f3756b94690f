//! Configuration management for the gesture pointer pipeline.

use crate::{
    constants::{
        DEFAULT_DEADZONE, DEFAULT_JOYSTICK_THRESHOLD, DEFAULT_MAX_SPEED, DEFAULT_SPEED_ACCELERATION,
        DEFAULT_SPEED_BASE,
    },
    pipeline::CHANNELS,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Signal definitions, one per named control channel
    pub signals: Vec<SignalDefinition>,

    /// Pose estimation configuration
    pub pose: PoseConfig,

    /// Target monitor geometry
    pub monitor: MonitorConfig,

    /// Motion mapper configuration
    pub motion: MotionConfig,
}

/// One named signal: normalization thresholds and smoothing strength
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDefinition {
    pub name: String,
    pub lower_threshold: f64,
    pub higher_threshold: f64,
    pub filter_value: f64,
}

/// Pose estimation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseConfig {
    /// Strategy name: "pnp", "procrustes" or "external"
    pub strategy: String,

    /// Path to the canonical 3-D face model points
    pub model_path: PathBuf,

    /// Camera intrinsics for the pnp strategy
    pub focal_x: f64,
    pub focal_y: f64,
    pub principal_x: f64,
    pub principal_y: f64,

    /// Depth correction for the procrustes strategy
    pub perspective_factor: f64,
}

/// Target monitor geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub width_px: u32,
    pub height_px: u32,
    pub width_mm: f64,
    pub height_mm: f64,
}

/// Motion mapper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Mode name: "absolute", "relative" or "joystick"
    pub mode: String,

    /// Signal names feeding the horizontal and vertical axes
    pub x_signal: String,
    pub y_signal: String,

    /// Drive the pointer from the projected screen point instead of the
    /// axis signals
    pub use_screen_point: bool,

    pub invert_x: bool,
    pub invert_y: bool,

    /// Exponential speed curve parameters
    pub base: f64,
    pub acceleration: f64,
    pub max_speed: f64,
    pub deadzone: f64,
    pub joystick_threshold: f64,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            strategy: "procrustes".to_string(),
            model_path: PathBuf::from("assets/canonical_face_model.txt"),
            focal_x: 800.0,
            focal_y: 800.0,
            principal_x: 640.0,
            principal_y: 360.0,
            perspective_factor: 1.0,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            width_px: 1920,
            height_px: 1080,
            width_mm: 344.0,
            height_mm: 194.0,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            mode: "absolute".to_string(),
            x_signal: "Yaw".to_string(),
            y_signal: "Pitch".to_string(),
            use_screen_point: false,
            invert_x: false,
            invert_y: false,
            base: DEFAULT_SPEED_BASE,
            acceleration: DEFAULT_SPEED_ACCELERATION,
            max_speed: DEFAULT_MAX_SPEED,
            deadzone: DEFAULT_DEADZONE,
            joystick_threshold: DEFAULT_JOYSTICK_THRESHOLD,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default signal set covering every pipeline channel.
    #[must_use]
    pub fn default_signals() -> Vec<SignalDefinition> {
        let range = |name: &str, lower: f64, higher: f64, filter: f64| SignalDefinition {
            name: name.to_string(),
            lower_threshold: lower,
            higher_threshold: higher,
            filter_value: filter,
        };
        vec![
            range("Pitch", -20.0, 20.0, 0.001),
            range("Yaw", -25.0, 25.0, 0.001),
            range("Roll", -20.0, 20.0, 0.001),
            range("JawOpen", 0.4, 0.55, 0.001),
            range("MouthPuck", 0.12, 0.2, 0.001),
            range("BrowRaise", 0.9, 1.2, 0.001),
            range("Smile", 0.9, 1.2, 0.001),
        ]
    }

    /// Validate the configuration, failing fast on anything that would
    /// misbehave at runtime.
    ///
    /// # Errors
    ///
    /// Returns a descriptive [`Error::Config`] for the first problem found.
    pub fn validate(&self) -> Result<()> {
        for signal in &self.signals {
            if signal.name.is_empty() {
                return Err(Error::Config("Signal with an empty name".to_string()));
            }
            if signal.lower_threshold == signal.higher_threshold {
                return Err(Error::Config(format!(
                    "Signal '{}': thresholds must differ (both {})",
                    signal.name, signal.lower_threshold
                )));
            }
            if signal.filter_value < 0.0 {
                return Err(Error::Config(format!(
                    "Signal '{}': filter value must be non-negative",
                    signal.name
                )));
            }
        }
        let mut names: Vec<&str> = self.signals.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::Config("Duplicate signal name".to_string()));
        }

        match self.pose.strategy.as_str() {
            "pnp" | "procrustes" | "external" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unknown pose strategy '{other}' (expected pnp, procrustes or external)"
                )));
            }
        }
        if self.pose.strategy != "external" && !self.pose.model_path.exists() {
            return Err(Error::Config(format!(
                "Canonical face model not found: {}",
                self.pose.model_path.display()
            )));
        }
        if self.pose.strategy == "pnp" && (self.pose.focal_x <= 0.0 || self.pose.focal_y <= 0.0) {
            return Err(Error::Config("Camera focal lengths must be positive".to_string()));
        }

        if self.monitor.width_px == 0 || self.monitor.height_px == 0 {
            return Err(Error::Config("Monitor pixel dimensions must be positive".to_string()));
        }
        if self.monitor.width_mm <= 0.0 || self.monitor.height_mm <= 0.0 {
            return Err(Error::Config("Monitor physical dimensions must be positive".to_string()));
        }

        match self.motion.mode.as_str() {
            "absolute" | "relative" | "joystick" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unknown motion mode '{other}' (expected absolute, relative or joystick)"
                )));
            }
        }
        if !self.motion.use_screen_point {
            for axis in [&self.motion.x_signal, &self.motion.y_signal] {
                let defined = self.signals.iter().any(|s| &s.name == axis) || CHANNELS.contains(&axis.as_str());
                if !defined {
                    return Err(Error::Config(format!(
                        "Motion mapper references unknown signal '{axis}'"
                    )));
                }
            }
        }
        if self.motion.base <= 1.0 {
            return Err(Error::Config("Motion speed base must exceed 1".to_string()));
        }
        if self.motion.acceleration <= 0.0 || self.motion.max_speed <= 0.0 {
            return Err(Error::Config(
                "Motion acceleration and max speed must be positive".to_string(),
            ));
        }
        if self.motion.deadzone < 0.0 {
            return Err(Error::Config("Motion deadzone must be non-negative".to_string()));
        }
        if self.motion.joystick_threshold <= 0.0 || self.motion.joystick_threshold >= 0.5 {
            return Err(Error::Config("Joystick threshold must be in (0, 0.5)".to_string()));
        }

        Ok(())
    }
}

/// One entry of a JSON action profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileEntry {
    /// Action kind: "keyboard_key" or "mouse_button"
    pub action: String,

    /// Name of the signal the action attaches to
    pub signal: String,

    /// Threshold on the signal's filtered raw value
    pub threshold: f64,

    /// Trigger: "up", "down", "hold high" or "hold low"
    pub trigger: String,

    /// For keyboard actions: "press", "release" or "press and release"
    #[serde(default)]
    pub action_type: String,

    /// Key name for keyboard actions, button name for mouse actions
    pub key: String,
}

/// Load a JSON action profile
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<Vec<ProfileEntry>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| Error::Profile(format!("Failed to parse profile: {e}")))
}

/// Save a JSON action profile
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn save_profile<P: AsRef<Path>>(path: P, entries: &[ProfileEntry]) -> Result<()> {
    let content =
        serde_json::to_string_pretty(entries).map_err(|e| Error::Profile(format!("Failed to serialize profile: {e}")))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Gesture pointer configuration

signals:
  - name: "Pitch"
    lower_threshold: -20.0
    higher_threshold: 20.0
    filter_value: 0.001
  - name: "Yaw"
    lower_threshold: -25.0
    higher_threshold: 25.0
    filter_value: 0.001
  - name: "JawOpen"
    lower_threshold: 0.4
    higher_threshold: 0.55
    filter_value: 0.001

pose:
  strategy: "procrustes"
  model_path: "assets/canonical_face_model.txt"
  focal_x: 800.0
  focal_y: 800.0
  principal_x: 640.0
  principal_y: 360.0
  perspective_factor: 1.0

monitor:
  width_px: 1920
  height_px: 1080
  width_mm: 344.0
  height_mm: 194.0

motion:
  mode: "absolute"
  x_signal: "Yaw"
  y_signal: "Pitch"
  use_screen_point: false
  invert_x: false
  invert_y: false
  base: 2.0
  acceleration: 25.0
  max_speed: 24.0
  deadzone: 0.004
  joystick_threshold: 0.15
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            signals: Config::default_signals(),
            pose: PoseConfig {
                strategy: "external".to_string(),
                ..PoseConfig::default()
            },
            monitor: MonitorConfig::default(),
            motion: MotionConfig::default(),
        }
    }

    #[test]
    fn test_example_config_parses_and_validates() {
        let config: Config = serde_yaml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.signals.len(), 3);
        assert_eq!(config.motion.mode, "absolute");
        // Only the model file check should be able to fail here
        let result = config.validate();
        if let Err(e) = result {
            assert!(e.to_string().contains("model"), "{e}");
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_equal_thresholds_rejected() {
        let mut config = valid_config();
        config.signals[0].higher_threshold = config.signals[0].lower_threshold;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_signal_names_rejected() {
        let mut config = valid_config();
        let first = config.signals[0].clone();
        config.signals.push(first);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_motion_signal_rejected() {
        let mut config = valid_config();
        config.motion.x_signal = "NoSuchSignal".to_string();
        assert!(config.validate().is_err());
        // Not checked when the screen point drives the pointer
        config.motion.use_screen_point = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_strategy_and_mode_rejected() {
        let mut config = valid_config();
        config.pose.strategy = "magic".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.motion.mode = "teleport".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_profile_round_trip() {
        let entries = vec![ProfileEntry {
            action: "keyboard_key".to_string(),
            signal: "JawOpen".to_string(),
            threshold: 0.5,
            trigger: "up".to_string(),
            action_type: "press and release".to_string(),
            key: "space".to_string(),
        }];
        let json = serde_json::to_string(&entries).unwrap();
        let back: Vec<ProfileEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].signal, "JawOpen");
        assert_eq!(back[0].trigger, "up");
    }
}
