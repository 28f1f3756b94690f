//! Projection of the head forward direction onto the display.
//!
//! The forward ray is anchored at the rotated canonical nose tip and
//! intersected with the display plane at z = 0 in camera space. The
//! [`Monitor`] mapping then converts camera-space millimeters to display
//! pixels; it assumes a built-in laptop camera centered above the panel and
//! is supplied by configuration, not discovered.

use crate::{
    constants::{CAMERA_OFFSET_Y_MM, POSE_UNITS_TO_MM, PROJECTION_EPSILON},
    pose::Pose,
    Error, Result,
};
use nalgebra::{Vector2, Vector3};

/// Target display geometry and the camera-space to pixel mapping
#[derive(Debug, Clone, Copy)]
pub struct Monitor {
    width_px: f64,
    height_px: f64,
    width_mm: f64,
    height_mm: f64,
}

impl Monitor {
    /// Build a monitor mapping from pixel and physical dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension is not positive.
    pub fn new(width_px: u32, height_px: u32, width_mm: f64, height_mm: f64) -> Result<Self> {
        if width_px == 0 || height_px == 0 || width_mm <= 0.0 || height_mm <= 0.0 {
            return Err(Error::Config(format!(
                "Monitor dimensions must be positive: {width_px}x{height_px} px, {width_mm}x{height_mm} mm"
            )));
        }
        Ok(Self {
            width_px: f64::from(width_px),
            height_px: f64::from(height_px),
            width_mm,
            height_mm,
        })
    }

    #[must_use]
    pub fn width_px(&self) -> f64 {
        self.width_px
    }

    #[must_use]
    pub fn height_px(&self) -> f64 {
        self.height_px
    }

    /// Average pixels-per-millimeter across both axes
    #[must_use]
    pub fn ppmm(&self) -> f64 {
        (self.width_px / self.width_mm + self.height_px / self.height_mm) / 2.0
    }

    /// Map camera-space millimeters to display pixel coordinates.
    ///
    /// The camera sits centered above the display, [`CAMERA_OFFSET_Y_MM`]
    /// above the top edge, with camera x pointing left in display terms.
    #[must_use]
    pub fn camera_to_monitor(&self, x_mm: f64, y_mm: f64) -> Vector2<f64> {
        let x_px = ((self.width_px / 2.0).floor() - x_mm * self.width_px / self.width_mm).ceil();
        let y_px = ((y_mm - CAMERA_OFFSET_Y_MM) * self.height_px / self.height_mm).ceil();
        Vector2::new(x_px, y_px)
    }

    /// Map display pixel coordinates to camera-space millimeters (z = 0).
    #[must_use]
    pub fn monitor_to_camera(&self, x_px: f64, y_px: f64) -> Vector3<f64> {
        let x_mm = ((self.width_px / 2.0).floor() - x_px) / self.width_px * self.width_mm;
        let y_mm = CAMERA_OFFSET_Y_MM + y_px / self.height_px * self.height_mm;
        Vector3::new(x_mm, y_mm, 0.0)
    }

    #[must_use]
    pub fn pixel_to_mm(&self, pixels: f64) -> f64 {
        pixels / self.ppmm()
    }

    #[must_use]
    pub fn mm_to_pixel(&self, mm: f64) -> f64 {
        mm * self.ppmm()
    }
}

/// Intersect the head forward ray with the display plane (z = 0).
///
/// `anchor` is the canonical anchor offset (nose tip) in model units. The
/// result is in the pose's units on the display plane, `None` when the ray
/// runs parallel to the plane or the result is non-finite.
#[must_use]
pub fn screen_intersection(pose: &Pose, anchor: &Vector3<f64>) -> Option<Vector2<f64>> {
    let rotation = pose.rotation_matrix();
    let forward = rotation * Vector3::new(0.0, 0.0, -1.0);
    if forward.z.abs() < PROJECTION_EPSILON {
        return None;
    }
    let anchor_point = rotation * anchor + pose.translation;
    let hit = anchor_point - forward * (anchor_point.z / forward.z);
    let point = Vector2::new(hit.x, hit.y);
    (point.x.is_finite() && point.y.is_finite()).then_some(point)
}

/// Projects the estimated head direction to display pixels
#[derive(Debug, Clone, Copy)]
pub struct ScreenProjector {
    monitor: Monitor,
}

impl ScreenProjector {
    #[must_use]
    pub fn new(monitor: Monitor) -> Self {
        Self { monitor }
    }

    #[must_use]
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Project a pose to display pixel coordinates.
    ///
    /// Returns `None` when the projection is undefined this frame.
    #[must_use]
    pub fn project(&self, pose: &Pose, anchor: &Vector3<f64>) -> Option<Vector2<f64>> {
        let hit = screen_intersection(pose, anchor)?;
        Some(
            self.monitor
                .camera_to_monitor(hit.x * POSE_UNITS_TO_MM, hit.y * POSE_UNITS_TO_MM),
        )
    }
}
