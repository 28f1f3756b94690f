//! Engine driving the pipeline from a landmark source.
//!
//! The engine is single-threaded per frame: one landmark set in, one signal
//! update out, synchronously. The signal map sits behind a mutex because
//! configuration edits (thresholds, filter strengths, action bindings)
//! arrive from a control thread while frames keep streaming; the per-frame
//! update and those edits serialize on that lock. The landmark source is a
//! non-blocking poll with a "no data this tick" result, so a stalled
//! tracker never stalls the engine.

use crate::{
    config::{Config, ProfileEntry},
    devices::{KeyboardDevice, MouseButton, PointerDevice},
    landmarks::CameraIntrinsics,
    motion::{MotionMapper, MotionMode, SpeedCurve},
    pipeline::{FrameInput, SignalsPipeline},
    pose::{PoseEstimator, PoseStrategy},
    projection::{Monitor, ScreenProjector},
    signal::{Action, ActionId, Signal},
    Error, Result,
};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::{Duration, Instant};

/// Result of polling a landmark source
pub enum SourceTick {
    /// A fresh landmark frame
    Frame(FrameInput),
    /// No data this tick; the engine yields and polls again
    Empty,
    /// The source is exhausted; the engine stops
    Closed,
}

/// Non-blocking provider of landmark frames
pub trait LandmarkSource: Send {
    /// Poll for the next frame without blocking.
    ///
    /// # Errors
    ///
    /// Source-level failures (decode errors, lost connection) surface here;
    /// the engine logs them and keeps polling.
    fn poll(&mut self) -> Result<SourceTick>;
}

/// Shared handle to the named signal map
pub type SignalMap = Arc<Mutex<HashMap<String, Signal>>>;

/// Engine wiring the pipeline, signals, motion mapper and devices together
pub struct GestureEngine {
    pipeline: SignalsPipeline,
    signals: SignalMap,
    mapper: MotionMapper,
    pointer: Arc<Mutex<dyn PointerDevice>>,
    keyboard: Arc<Mutex<dyn KeyboardDevice>>,
    monitor: Monitor,
    motion_enabled: bool,
    use_screen_point: bool,
    x_signal: String,
    y_signal: String,
    stop: Arc<AtomicBool>,
    next_action_id: AtomicU64,
    fps: f64,
    window_frames: u64,
    window_start: Instant,
}

impl GestureEngine {
    /// Build an engine from a validated configuration, loading the
    /// canonical face model from the configured path.
    ///
    /// # Errors
    ///
    /// Propagates configuration validation and model loading errors.
    pub fn from_config(
        config: &Config,
        pointer: Arc<Mutex<dyn PointerDevice>>,
        keyboard: Arc<Mutex<dyn KeyboardDevice>>,
    ) -> Result<Self> {
        config.validate()?;
        let strategy = match config.pose.strategy.as_str() {
            "pnp" => PoseStrategy::Pnp {
                intrinsics: CameraIntrinsics::new(
                    config.pose.focal_x,
                    config.pose.focal_y,
                    config.pose.principal_x,
                    config.pose.principal_y,
                ),
            },
            "procrustes" => PoseStrategy::Procrustes {
                perspective_factor: config.pose.perspective_factor,
            },
            _ => PoseStrategy::External,
        };
        let estimator = PoseEstimator::from_model_file(&config.pose.model_path, strategy)?;
        let monitor = Monitor::new(
            config.monitor.width_px,
            config.monitor.height_px,
            config.monitor.width_mm,
            config.monitor.height_mm,
        )?;
        let pipeline = SignalsPipeline::new(estimator, ScreenProjector::new(monitor));
        Self::from_parts(pipeline, config, pointer, keyboard)
    }

    /// Build an engine around an existing pipeline (the model already
    /// loaded or constructed in memory).
    ///
    /// # Errors
    ///
    /// Propagates configuration validation errors other than the model
    /// path check.
    pub fn from_parts(
        mut pipeline: SignalsPipeline,
        config: &Config,
        pointer: Arc<Mutex<dyn PointerDevice>>,
        keyboard: Arc<Mutex<dyn KeyboardDevice>>,
    ) -> Result<Self> {
        let monitor = Monitor::new(
            config.monitor.width_px,
            config.monitor.height_px,
            config.monitor.width_mm,
            config.monitor.height_mm,
        )?;

        let mut signals = HashMap::new();
        for definition in &config.signals {
            let mut signal = Signal::new(definition.name.clone());
            signal.set_thresholds(Some(definition.lower_threshold), Some(definition.higher_threshold))?;
            signal.set_filter_strength(definition.filter_value);
            signals.insert(definition.name.clone(), signal);
            // Channel-level smoothing stays off for per-signal filtered
            // channels; the signal's own filter does the smoothing.
            let _ = pipeline.set_filter_strength(&definition.name, 0.0);
        }

        let mode = match config.motion.mode.as_str() {
            "relative" => MotionMode::Relative,
            "joystick" => MotionMode::Joystick,
            _ => MotionMode::Absolute,
        };
        let curve = SpeedCurve::new(
            config.motion.base,
            config.motion.acceleration,
            config.motion.max_speed,
            config.motion.deadzone,
        )?;
        let mut mapper = MotionMapper::new(mode, monitor, curve, config.motion.joystick_threshold)?;
        mapper.set_inversion(config.motion.invert_x, config.motion.invert_y);

        info!(
            "Engine ready: {} signals, {mode:?} motion, {}x{} px display",
            config.signals.len(),
            config.monitor.width_px,
            config.monitor.height_px
        );

        Ok(Self {
            pipeline,
            signals: Arc::new(Mutex::new(signals)),
            mapper,
            pointer,
            keyboard,
            monitor,
            motion_enabled: false,
            use_screen_point: config.motion.use_screen_point,
            x_signal: config.motion.x_signal.clone(),
            y_signal: config.motion.y_signal.clone(),
            stop: Arc::new(AtomicBool::new(false)),
            next_action_id: AtomicU64::new(1),
            fps: 0.0,
            window_frames: 0,
            window_start: Instant::now(),
        })
    }

    /// Shared handle to the signal map for control-thread edits
    #[must_use]
    pub fn signals(&self) -> SignalMap {
        Arc::clone(&self.signals)
    }

    /// Flag that makes [`GestureEngine::run`] return after the current frame
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Enable or disable pointer motion (actions keep firing either way)
    pub fn set_motion_enabled(&mut self, enabled: bool) {
        info!("Pointer motion {}", if enabled { "enabled" } else { "disabled" });
        self.motion_enabled = enabled;
    }

    pub fn set_motion_mode(&mut self, mode: MotionMode) {
        self.mapper.set_mode(mode);
    }

    pub fn next_motion_mode(&mut self) {
        self.mapper.next_mode();
        info!("Motion mode: {:?}", self.mapper.mode());
    }

    pub fn prev_motion_mode(&mut self) {
        self.mapper.prev_mode();
        info!("Motion mode: {:?}", self.mapper.mode());
    }

    #[must_use]
    pub fn motion_mode(&self) -> MotionMode {
        self.mapper.mode()
    }

    /// Frames per second over the last accounting window
    #[must_use]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Attach the actions of a JSON profile to their signals.
    ///
    /// Returns the handles of the attached actions so callers can remove
    /// them later.
    ///
    /// # Errors
    ///
    /// Fails fast on an unknown signal name, trigger, action kind or
    /// action type; no actions are attached on error.
    pub fn bind_profile(&self, entries: &[ProfileEntry]) -> Result<Vec<(String, ActionId)>> {
        let mut signals = lock(&self.signals);

        // Validate everything before touching any signal
        for entry in entries {
            if !signals.contains_key(&entry.signal) {
                return Err(Error::Profile(format!(
                    "Profile references unknown signal '{}'",
                    entry.signal
                )));
            }
            build_callback(entry, &self.pointer, &self.keyboard)?;
            parse_trigger(&entry.trigger)?;
        }

        let mut bound = Vec::with_capacity(entries.len());
        for entry in entries {
            let id = ActionId::new(self.next_action_id.fetch_add(1, Ordering::Relaxed));
            let mut action = Action::new(entry.threshold);
            let callback = build_callback(entry, &self.pointer, &self.keyboard)?;
            match parse_trigger(&entry.trigger)? {
                Trigger::Up => action.set_up_action(callback),
                Trigger::Down => action.set_down_action(callback),
                Trigger::HoldHigh => action.set_hold_high_action(callback),
                Trigger::HoldLow => action.set_hold_low_action(callback),
            }
            if let Some(signal) = signals.get_mut(&entry.signal) {
                signal.add_action(id, action);
                bound.push((entry.signal.clone(), id));
            }
        }
        info!("Bound {} profile actions", bound.len());
        Ok(bound)
    }

    /// Run until the source closes or the stop flag is raised.
    ///
    /// # Errors
    ///
    /// Only construction-level problems escape; per-frame failures are
    /// logged and skipped so the engine can process the next frame.
    pub fn run(&mut self, source: &mut dyn LandmarkSource) -> Result<()> {
        info!("Engine loop started");
        while !self.stop.load(Ordering::Relaxed) {
            match source.poll() {
                Ok(SourceTick::Frame(input)) => {
                    if let Err(e) = self.process_frame(&input) {
                        warn!("Frame skipped: {e}");
                    }
                }
                Ok(SourceTick::Empty) => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Ok(SourceTick::Closed) => {
                    info!("Landmark source closed");
                    break;
                }
                Err(e) => {
                    warn!("Landmark source error: {e}");
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
        info!("Engine loop finished");
        Ok(())
    }

    /// Process one landmark frame: pipeline, signal updates, pointer motion.
    ///
    /// # Errors
    ///
    /// Propagates landmark-set level errors; pose/projection degeneracies
    /// are absorbed by the pipeline.
    pub fn process_frame(&mut self, input: &FrameInput) -> Result<()> {
        let frame = self.pipeline.process(input)?;

        let pair = {
            let mut signals = lock(&self.signals);
            for (name, value) in frame.values() {
                if let Some(signal) = signals.get_mut(name) {
                    signal.set_value(value);
                }
            }

            if !self.motion_enabled {
                None
            } else if self.use_screen_point {
                frame.screen_px.map(|px| {
                    (
                        (px.x / self.monitor.width_px()).clamp(0.0, 1.0),
                        (px.y / self.monitor.height_px()).clamp(0.0, 1.0),
                    )
                })
            } else {
                let x = signals.get(&self.x_signal).map(Signal::scaled_value);
                let y = signals.get(&self.y_signal).map(Signal::scaled_value);
                x.zip(y)
            }
        };

        if let Some((x, y)) = pair {
            if let Some(motion) = self.mapper.update(x, y) {
                debug!("Pointer {motion:?}");
                lock_device(&self.pointer).apply(motion);
            }
        }

        self.account_frame();
        Ok(())
    }

    fn account_frame(&mut self) {
        self.window_frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.window_frames as f64 / elapsed.as_secs_f64();
            self.window_frames = 0;
            self.window_start = Instant::now();
        }
    }
}

enum Trigger {
    Up,
    Down,
    HoldHigh,
    HoldLow,
}

fn parse_trigger(trigger: &str) -> Result<Trigger> {
    match trigger {
        "up" => Ok(Trigger::Up),
        "down" => Ok(Trigger::Down),
        "hold high" => Ok(Trigger::HoldHigh),
        "hold low" => Ok(Trigger::HoldLow),
        other => Err(Error::Profile(format!("Unknown trigger '{other}'"))),
    }
}

fn parse_button(name: &str) -> Result<MouseButton> {
    match name {
        "left" => Ok(MouseButton::Left),
        "right" => Ok(MouseButton::Right),
        "middle" => Ok(MouseButton::Middle),
        other => Err(Error::Profile(format!("Unknown mouse button '{other}'"))),
    }
}

/// Build the device callback for one profile entry.
fn build_callback(
    entry: &ProfileEntry,
    pointer: &Arc<Mutex<dyn PointerDevice>>,
    keyboard: &Arc<Mutex<dyn KeyboardDevice>>,
) -> Result<Box<dyn FnMut() + Send>> {
    match entry.action.as_str() {
        "keyboard_key" => {
            let key = entry.key.clone();
            if key.is_empty() {
                return Err(Error::Profile("Keyboard action with an empty key".to_string()));
            }
            let keyboard = Arc::clone(keyboard);
            match entry.action_type.as_str() {
                "press" => Ok(Box::new(move || lock_device(&keyboard).press(&key))),
                "release" => Ok(Box::new(move || lock_device(&keyboard).release(&key))),
                "hold" | "press and release" => Ok(Box::new(move || {
                    let mut device = lock_device(&keyboard);
                    device.press(&key);
                    device.release(&key);
                })),
                other => Err(Error::Profile(format!("Unknown keyboard action type '{other}'"))),
            }
        }
        "mouse_button" => {
            let button = parse_button(&entry.key)?;
            let pointer = Arc::clone(pointer);
            match entry.action_type.as_str() {
                "" | "click" => Ok(Box::new(move || lock_device(&pointer).click(button))),
                "double_click" => Ok(Box::new(move || lock_device(&pointer).double_click(button))),
                other => Err(Error::Profile(format!("Unknown mouse action type '{other}'"))),
            }
        }
        other => Err(Error::Profile(format!("Unknown action kind '{other}'"))),
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panicked holder leaves valid data behind for this use
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn lock_device<T: ?Sized>(device: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    lock(device)
}
