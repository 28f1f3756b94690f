//! Per-frame orchestration: landmarks in, named signal values out.
//!
//! One [`SignalsPipeline::process`] call runs pose estimation, screen
//! projection and the geometric feature extractors over a landmark frame,
//! pushing each raw quantity through its channel filter. A degenerate pose
//! or projection only silences the channels derived from it; feature
//! channels computed independently still update. A frame with no landmarks
//! never reaches the pipeline (the engine skips it), so filter state is
//! untouched on missing input.

use crate::{
    constants::DEFAULT_SCREEN_FILTER_STRENGTH,
    features,
    filters::{FilteredPoint, FilteredValue},
    landmarks::LandmarkSet,
    pose::{Pose, PoseEstimator},
    projection::ScreenProjector,
    Error, Result,
};
use nalgebra::Vector2;

/// Signal channel names produced by the pipeline
pub const CHANNEL_PITCH: &str = "Pitch";
pub const CHANNEL_YAW: &str = "Yaw";
pub const CHANNEL_ROLL: &str = "Roll";
pub const CHANNEL_JAW_OPEN: &str = "JawOpen";
pub const CHANNEL_MOUTH_PUCK: &str = "MouthPuck";
pub const CHANNEL_BROW_RAISE: &str = "BrowRaise";
pub const CHANNEL_SMILE: &str = "Smile";
pub const CHANNEL_SCREEN_XY: &str = "ScreenXY";

/// All channel names, in emission order
pub const CHANNELS: [&str; 8] = [
    CHANNEL_PITCH,
    CHANNEL_YAW,
    CHANNEL_ROLL,
    CHANNEL_JAW_OPEN,
    CHANNEL_MOUTH_PUCK,
    CHANNEL_BROW_RAISE,
    CHANNEL_SMILE,
    CHANNEL_SCREEN_XY,
];

/// One frame of input from the external tracker
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub landmarks: LandmarkSet,
    /// Pose computed by an external model, consumed by the External
    /// strategy only
    pub external_pose: Option<Pose>,
}

impl FrameInput {
    #[must_use]
    pub fn new(landmarks: LandmarkSet) -> Self {
        Self {
            landmarks,
            external_pose: None,
        }
    }

    #[must_use]
    pub fn with_external_pose(landmarks: LandmarkSet, pose: Pose) -> Self {
        Self {
            landmarks,
            external_pose: Some(pose),
        }
    }
}

/// Snapshot of every signal quantity for one frame.
///
/// Channels whose subsystem failed this frame are `None`; consumers keep
/// their previous state for those. The bundle is immutable once produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalFrame {
    pub pose: Option<Pose>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
    pub roll: Option<f64>,
    pub jaw_open: Option<f64>,
    pub mouth_puck: Option<f64>,
    pub brow_raise: Option<f64>,
    pub smile: Option<f64>,
    /// Projected aim point in display pixels
    pub screen_px: Option<Vector2<f64>>,
}

impl SignalFrame {
    /// Scalar channel values that updated this frame, by name.
    #[must_use]
    pub fn values(&self) -> Vec<(&'static str, f64)> {
        let mut out = Vec::with_capacity(7);
        let mut push = |name, value: Option<f64>| {
            if let Some(value) = value {
                out.push((name, value));
            }
        };
        push(CHANNEL_PITCH, self.pitch);
        push(CHANNEL_YAW, self.yaw);
        push(CHANNEL_ROLL, self.roll);
        push(CHANNEL_JAW_OPEN, self.jaw_open);
        push(CHANNEL_MOUTH_PUCK, self.mouth_puck);
        push(CHANNEL_BROW_RAISE, self.brow_raise);
        push(CHANNEL_SMILE, self.smile);
        out
    }
}

/// Orchestrates pose estimation, feature extraction and filtering per frame
pub struct SignalsPipeline {
    estimator: PoseEstimator,
    projector: ScreenProjector,
    pitch: FilteredValue,
    yaw: FilteredValue,
    roll: FilteredValue,
    jaw_open: FilteredValue,
    mouth_puck: FilteredValue,
    brow_raise: FilteredValue,
    smile: FilteredValue,
    screen_xy: FilteredPoint,
}

impl SignalsPipeline {
    /// Build a pipeline; the screen point gets the default smoothing
    /// strength, every other channel starts unfiltered.
    #[must_use]
    pub fn new(estimator: PoseEstimator, projector: ScreenProjector) -> Self {
        Self {
            estimator,
            projector,
            pitch: FilteredValue::new(0.0),
            yaw: FilteredValue::new(0.0),
            roll: FilteredValue::new(0.0),
            jaw_open: FilteredValue::new(0.0),
            mouth_puck: FilteredValue::new(0.0),
            brow_raise: FilteredValue::new(0.0),
            smile: FilteredValue::new(0.0),
            screen_xy: FilteredPoint::with_strength(Vector2::zeros(), DEFAULT_SCREEN_FILTER_STRENGTH),
        }
    }

    /// Reconfigure the smoothing strength of one channel by name.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown channel name.
    pub fn set_filter_strength(&mut self, channel: &str, strength: f64) -> Result<()> {
        match channel {
            CHANNEL_PITCH => self.pitch.set_filter_strength(strength),
            CHANNEL_YAW => self.yaw.set_filter_strength(strength),
            CHANNEL_ROLL => self.roll.set_filter_strength(strength),
            CHANNEL_JAW_OPEN => self.jaw_open.set_filter_strength(strength),
            CHANNEL_MOUTH_PUCK => self.mouth_puck.set_filter_strength(strength),
            CHANNEL_BROW_RAISE => self.brow_raise.set_filter_strength(strength),
            CHANNEL_SMILE => self.smile.set_filter_strength(strength),
            CHANNEL_SCREEN_XY => self.screen_xy.set_filter_strength(strength),
            other => {
                return Err(Error::Signal(format!("Unknown signal channel '{other}'")));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn estimator(&self) -> &PoseEstimator {
        &self.estimator
    }

    /// Process one landmark frame into a [`SignalFrame`].
    ///
    /// # Errors
    ///
    /// Only landmark-set level problems (wrong size, non-finite input)
    /// error out; pose and projection degeneracies are downgraded to
    /// missing channels.
    pub fn process(&mut self, input: &FrameInput) -> Result<SignalFrame> {
        let landmarks = &input.landmarks;
        let mut frame = SignalFrame::default();

        match self.estimator.estimate(landmarks, input.external_pose) {
            Ok(pose) => {
                let (pitch, yaw, roll) = pose.euler_degrees();
                frame.pose = Some(pose);
                frame.pitch = Some(self.pitch.set(pitch));
                frame.yaw = Some(self.yaw.set(yaw));
                frame.roll = Some(self.roll.set(roll));

                match self.estimator.canonical_anchor() {
                    Ok(anchor) => {
                        if let Some(px) = self.projector.project(&pose, &anchor) {
                            frame.screen_px = Some(self.screen_xy.set(px));
                        } else {
                            log::debug!("Screen projection undefined this frame");
                        }
                    }
                    Err(e) => log::warn!("No projection anchor: {e}"),
                }
            }
            Err(e) => {
                log::debug!("Pose estimation skipped this frame: {e}");
            }
        }

        frame.jaw_open = feature_channel(features::jaw_open(landmarks), "jaw-open").map(|v| self.jaw_open.set(v));
        frame.mouth_puck =
            feature_channel(features::mouth_pucker(landmarks), "mouth-pucker").map(|v| self.mouth_puck.set(v));
        frame.brow_raise =
            feature_channel(features::brow_raise(landmarks), "brow-raise").map(|v| self.brow_raise.set(v));
        frame.smile = feature_channel(features::smile(landmarks), "smile").map(|v| self.smile.set(v));

        Ok(frame)
    }
}

fn feature_channel(value: Result<f64>, what: &str) -> Option<f64> {
    match value {
        Ok(v) if v.is_finite() => Some(v),
        Ok(_) => {
            log::debug!("Non-finite {what} measure skipped");
            None
        }
        Err(e) => {
            log::debug!("{what} measure skipped: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MIN_LANDMARKS;
    use crate::pose::{CanonicalFaceModel, PoseStrategy};
    use crate::projection::Monitor;
    use nalgebra::{Point3, Vector3};

    fn scattered_model() -> CanonicalFaceModel {
        let mut state: u64 = 0xDEAD_BEEF_CAFE_1234;
        let mut next = move || {
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            ((state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 40) as f64 / 1_677_721.6) - 5.0
        };
        CanonicalFaceModel::from_points((0..MIN_LANDMARKS).map(|_| Point3::new(next(), next(), next())).collect())
            .unwrap()
    }

    fn pipeline() -> SignalsPipeline {
        let estimator = PoseEstimator::new(
            scattered_model(),
            PoseStrategy::Procrustes { perspective_factor: 1.0 },
        );
        let monitor = Monitor::new(1920, 1080, 344.0, 194.0).unwrap();
        SignalsPipeline::new(estimator, ScreenProjector::new(monitor))
    }

    fn posed_input(pose: &Pose) -> FrameInput {
        let model = scattered_model();
        let rot = pose.rotation_matrix();
        let points = (0..model.len())
            .map(|i| {
                let p = rot * model.point(i).unwrap().coords + pose.translation;
                Point3::new(p.x, p.y, p.z)
            })
            .collect();
        FrameInput::new(LandmarkSet::new(points).unwrap())
    }

    #[test]
    fn test_full_frame_updates_all_channels() {
        let mut pipeline = pipeline();
        let pose = Pose::new(Vector3::new(0.05, -0.1, 0.02), Vector3::new(0.0, 4.0, 45.0));
        let frame = pipeline.process(&posed_input(&pose)).unwrap();

        assert!(frame.pose.is_some());
        assert!(frame.pitch.is_some());
        assert!(frame.yaw.is_some());
        assert!(frame.roll.is_some());
        assert!(frame.jaw_open.is_some());
        assert!(frame.mouth_puck.is_some());
        assert!(frame.brow_raise.is_some());
        assert!(frame.smile.is_some());
        assert!(frame.screen_px.is_some());

        let values = frame.values();
        assert_eq!(values.len(), 7);
        assert!(values.iter().all(|(_, v)| v.is_finite()));
    }

    #[test]
    fn test_degenerate_pose_keeps_feature_channels() {
        let mut pipeline = pipeline();
        // Flat (z = 0) landmarks defeat the Procrustes strategy but the
        // image-plane feature measures still work.
        let flat = LandmarkSet::new(
            (0..MIN_LANDMARKS)
                .map(|i| {
                    let a = i as f64 * 0.37;
                    Point3::new(100.0 + 40.0 * a.sin(), 100.0 + 40.0 * (1.7 * a).cos(), 0.0)
                })
                .collect(),
        )
        .unwrap();
        let frame = pipeline.process(&FrameInput::new(flat)).unwrap();

        assert!(frame.pose.is_none());
        assert!(frame.pitch.is_none());
        assert!(frame.screen_px.is_none());
        assert!(frame.jaw_open.is_some());
        assert!(frame.smile.is_some());
    }

    #[test]
    fn test_channel_strength_by_name() {
        let mut pipeline = pipeline();
        assert!(pipeline.set_filter_strength(CHANNEL_PITCH, 0.01).is_ok());
        assert!(pipeline.set_filter_strength(CHANNEL_SCREEN_XY, 0.05).is_ok());
        assert!(pipeline.set_filter_strength("NoSuchChannel", 0.05).is_err());
    }

    #[test]
    fn test_external_strategy_uses_supplied_pose() {
        let estimator = PoseEstimator::new(scattered_model(), PoseStrategy::External);
        let monitor = Monitor::new(1920, 1080, 344.0, 194.0).unwrap();
        let mut pipeline = SignalsPipeline::new(estimator, ScreenProjector::new(monitor));

        let pose = Pose::new(Vector3::new(0.0, 0.1, 0.0), Vector3::new(1.0, 5.0, 50.0));
        let input = posed_input(&pose);
        let with_pose = FrameInput::with_external_pose(input.landmarks.clone(), pose);
        let frame = pipeline.process(&with_pose).unwrap();
        assert_eq!(frame.pose.unwrap(), pose);

        // Without the external pose the pose channels stay silent
        let frame = pipeline.process(&input).unwrap();
        assert!(frame.pose.is_none());
        assert!(frame.jaw_open.is_some());
    }
}
