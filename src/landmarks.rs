//! Landmark set and camera intrinsics types.
//!
//! A landmark set is produced fresh each frame by an external tracker and is
//! only read by the pipeline; filter state is the only thing retained across
//! frames.

use crate::{constants::MIN_LANDMARKS, Error, Result};
use nalgebra::{Point2, Point3};

/// Ordered facial landmarks indexed by the face-mesh convention.
///
/// Points are stored as (x, y, z); 2-D trackers supply z = 0.
#[derive(Debug, Clone)]
pub struct LandmarkSet {
    points: Vec<Point3<f64>>,
}

impl LandmarkSet {
    /// Wrap a full set of 3-D landmark points.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than [`MIN_LANDMARKS`] points are supplied
    /// or any coordinate is non-finite.
    pub fn new(points: Vec<Point3<f64>>) -> Result<Self> {
        if points.len() < MIN_LANDMARKS {
            return Err(Error::Landmark(format!(
                "Expected at least {MIN_LANDMARKS} landmarks, got {}",
                points.len()
            )));
        }
        if points.iter().any(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(Error::Landmark("Non-finite landmark coordinate".to_string()));
        }
        Ok(Self { points })
    }

    /// Wrap a set of 2-D pixel-projected landmarks (z = 0).
    ///
    /// # Errors
    ///
    /// Same conditions as [`LandmarkSet::new`].
    pub fn from_pixels(points: &[(f64, f64)]) -> Result<Self> {
        Self::new(points.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect())
    }

    /// Number of landmarks in the set
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Landmark by index as a 3-D point.
    ///
    /// # Errors
    ///
    /// Returns an error for an out-of-range index.
    pub fn point(&self, index: usize) -> Result<Point3<f64>> {
        self.points
            .get(index)
            .copied()
            .ok_or_else(|| Error::Landmark(format!("Landmark index {index} out of range ({})", self.points.len())))
    }

    /// Landmark by index projected to the image plane (x, y only).
    ///
    /// # Errors
    ///
    /// Returns an error for an out-of-range index.
    pub fn point2(&self, index: usize) -> Result<Point2<f64>> {
        let p = self.point(index)?;
        Ok(Point2::new(p.x, p.y))
    }

    /// All points as a slice
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

/// Pinhole camera intrinsics of the source camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub focal_x: f64,
    pub focal_y: f64,
    pub principal_x: f64,
    pub principal_y: f64,
}

impl CameraIntrinsics {
    #[must_use]
    pub const fn new(focal_x: f64, focal_y: f64, principal_x: f64, principal_y: f64) -> Self {
        Self {
            focal_x,
            focal_y,
            principal_x,
            principal_y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> Vec<Point3<f64>> {
        (0..n).map(|i| Point3::new(i as f64, i as f64 * 2.0, 0.0)).collect()
    }

    #[test]
    fn test_rejects_short_set() {
        assert!(LandmarkSet::new(filled(10)).is_err());
        assert!(LandmarkSet::new(filled(MIN_LANDMARKS)).is_ok());
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut pts = filled(MIN_LANDMARKS);
        pts[3].y = f64::NAN;
        assert!(LandmarkSet::new(pts).is_err());
    }

    #[test]
    fn test_index_bounds() {
        let set = LandmarkSet::new(filled(MIN_LANDMARKS)).unwrap();
        assert!(set.point(MIN_LANDMARKS - 1).is_ok());
        assert!(set.point(MIN_LANDMARKS).is_err());
        let p = set.point2(5).unwrap();
        assert_eq!(p.x, 5.0);
        assert_eq!(p.y, 10.0);
    }
}
