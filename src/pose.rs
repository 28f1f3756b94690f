//! Head pose estimation from facial landmarks.
//!
//! Three interchangeable strategies, selected by configuration:
//!
//! - [`PoseStrategy::Pnp`] fits a rigid transform explaining the projection
//!   of a canonical 3-D face model onto 2-D pixel landmarks: a closed-form
//!   scaled-orthographic seed refined by Levenberg-Marquardt reprojection
//!   minimization.
//! - [`PoseStrategy::Procrustes`] rigidly aligns metric 3-D landmarks to the
//!   canonical model via SVD (Kabsch), no iteration.
//! - [`PoseStrategy::External`] accepts a pose computed by an external
//!   model, checked for finiteness only.
//!
//! All strategies report failure instead of propagating an invalid pose;
//! callers treat a failure as "no update this frame".

use crate::{
    constants::{EPSILON, MIN_LANDMARKS, PNP_MAX_ITERATIONS, PNP_STEP_EPSILON},
    landmarks::{CameraIntrinsics, LandmarkSet},
    Error, Result,
};
use nalgebra::{DMatrix, DVector, Matrix3, Point3, Rotation3, Vector2, Vector3, Vector6};
use std::fs;
use std::path::Path;

/// Expression-rigid landmark indices used for pose fitting (face-mesh
/// convention): nose tip/bottom, crown, eye outer corners, mouth corners,
/// chin, nose bridge, lower chin ridge.
pub const RIGID_LANDMARKS: [usize; 10] = [1, 4, 10, 33, 61, 152, 168, 199, 263, 291];

/// Rigid head pose relative to the camera.
///
/// `rotation` is in axis-angle form and is always derived from an
/// orthonormal rotation matrix with determinant +1; `translation` is in the
/// canonical model's units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl Pose {
    #[must_use]
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self { rotation, translation }
    }

    /// Rotation as a matrix
    #[must_use]
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        Rotation3::new(self.rotation)
    }

    /// Euler angles in degrees, extrinsic x-y-z order: the x rotation is
    /// pitch, y is yaw, z is roll for a camera-facing head.
    #[must_use]
    pub fn euler_degrees(&self) -> (f64, f64, f64) {
        let (x_rot, y_rot, z_rot) = self.rotation_matrix().euler_angles();
        (x_rot.to_degrees(), y_rot.to_degrees(), z_rot.to_degrees())
    }

    /// Whether every component is finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.rotation.iter().chain(self.translation.iter()).all(|v| v.is_finite())
    }
}

/// Canonical metric 3-D face model (face-mesh indexed, centimeters).
#[derive(Debug, Clone)]
pub struct CanonicalFaceModel {
    points: Vec<Point3<f64>>,
}

impl CanonicalFaceModel {
    /// Wrap a full set of canonical model points.
    ///
    /// # Errors
    ///
    /// Returns an error if the model does not cover the face-mesh index
    /// range.
    pub fn from_points(points: Vec<Point3<f64>>) -> Result<Self> {
        if points.len() < MIN_LANDMARKS {
            return Err(Error::ModelValidation(format!(
                "Canonical model must have at least {MIN_LANDMARKS} points, got {}",
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// Load model points from a text file, one coordinate per line
    /// (x, y, z per point).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the value count is not
    /// a multiple of three, or the model is too small.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        log::info!("Loading canonical face model: {}", path.as_ref().display());
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<Self> {
        let values: Vec<f64> = content
            .lines()
            .filter_map(|line| line.trim().parse::<f64>().ok())
            .collect();
        if values.len() % 3 != 0 {
            return Err(Error::ModelValidation(format!(
                "Model coordinate count {} is not a multiple of 3",
                values.len()
            )));
        }
        let points = values
            .chunks_exact(3)
            .map(|c| Point3::new(c[0], c[1], c[2]))
            .collect();
        Self::from_points(points)
    }

    /// Model point by face-mesh index.
    ///
    /// # Errors
    ///
    /// Returns an error for an out-of-range index.
    pub fn point(&self, index: usize) -> Result<Point3<f64>> {
        self.points
            .get(index)
            .copied()
            .ok_or_else(|| Error::ModelValidation(format!("Model index {index} out of range ({})", self.points.len())))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Pose estimation strategy, selected by configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseStrategy {
    /// Perspective-n-point fit of 2-D pixel landmarks against the canonical
    /// model under the given camera intrinsics
    Pnp { intrinsics: CameraIntrinsics },
    /// Rigid SVD alignment of metric 3-D landmarks; `perspective_factor`
    /// scales landmark depth before alignment to undo the virtual-camera
    /// frustum of the source tracker
    Procrustes { perspective_factor: f64 },
    /// Trust a pose supplied by an external model
    External,
}

/// Head pose estimator over a canonical face model
pub struct PoseEstimator {
    model: CanonicalFaceModel,
    strategy: PoseStrategy,
}

impl PoseEstimator {
    #[must_use]
    pub fn new(model: CanonicalFaceModel, strategy: PoseStrategy) -> Self {
        Self { model, strategy }
    }

    /// Load the canonical model from a file and build an estimator.
    ///
    /// # Errors
    ///
    /// Propagates model loading/validation errors.
    pub fn from_model_file<P: AsRef<Path>>(path: P, strategy: PoseStrategy) -> Result<Self> {
        Ok(Self::new(CanonicalFaceModel::from_file(path)?, strategy))
    }

    #[must_use]
    pub fn strategy(&self) -> PoseStrategy {
        self.strategy
    }

    #[must_use]
    pub fn model(&self) -> &CanonicalFaceModel {
        &self.model
    }

    /// Canonical nose-tip offset used as the projection anchor
    ///
    /// # Errors
    ///
    /// Returns an error if the model lacks the nose-tip index.
    pub fn canonical_anchor(&self) -> Result<Vector3<f64>> {
        Ok(self.model.point(crate::constants::LM_NOSE_TIP)?.coords)
    }

    /// Estimate the head pose for one landmark frame.
    ///
    /// `external` carries a pose computed upstream and is only consulted by
    /// the [`PoseStrategy::External`] strategy.
    ///
    /// # Errors
    ///
    /// Returns an error when too few landmarks are present, the solver
    /// fails, or the result is non-finite. The caller must treat this as
    /// "no pose update this frame" and keep prior filtered state.
    pub fn estimate(&self, landmarks: &LandmarkSet, external: Option<Pose>) -> Result<Pose> {
        let pose = match self.strategy {
            PoseStrategy::Pnp { intrinsics } => self.solve_pnp(landmarks, intrinsics)?,
            PoseStrategy::Procrustes { perspective_factor } => self.solve_procrustes(landmarks, perspective_factor)?,
            PoseStrategy::External => {
                external.ok_or_else(|| Error::Pose("External strategy requires an externally supplied pose".to_string()))?
            }
        };
        if !pose.is_finite() {
            return Err(Error::Pose("Non-finite pose result".to_string()));
        }
        Ok(pose)
    }

    fn fit_points(&self, landmarks: &LandmarkSet) -> Result<(Vec<Vector3<f64>>, Vec<Point3<f64>>)> {
        let mut object = Vec::with_capacity(RIGID_LANDMARKS.len());
        let mut measured = Vec::with_capacity(RIGID_LANDMARKS.len());
        for &index in &RIGID_LANDMARKS {
            object.push(self.model.point(index)?.coords);
            measured.push(landmarks.point(index)?);
        }
        Ok((object, measured))
    }

    /// Iterative perspective-n-point fit: scaled-orthographic seed, then
    /// Levenberg-Marquardt over (rvec, tvec) with a numeric Jacobian.
    fn solve_pnp(&self, landmarks: &LandmarkSet, intrinsics: CameraIntrinsics) -> Result<Pose> {
        let (object, measured) = self.fit_points(landmarks)?;
        let image: Vec<Vector2<f64>> = measured.iter().map(|p| Vector2::new(p.x, p.y)).collect();

        let mut params = pos_seed(&object, &image, intrinsics)?;
        let mut residual = reprojection_residuals(&object, &image, intrinsics, &params)?;
        let mut error = residual.norm_squared();
        let mut lambda = 1e-3;

        for _ in 0..PNP_MAX_ITERATIONS {
            let jacobian = numeric_jacobian(&object, &image, intrinsics, &params)?;
            let jt = jacobian.transpose();
            let jtj = &jt * &jacobian;
            let jtr = &jt * &residual;

            let mut accepted = false;
            for _ in 0..8 {
                let mut damped = jtj.clone();
                for k in 0..6 {
                    damped[(k, k)] += lambda * damped[(k, k)].max(1e-12);
                }
                let Some(delta) = damped.lu().solve(&jtr) else {
                    lambda *= 10.0;
                    continue;
                };
                let step: Vector6<f64> = Vector6::from_iterator(delta.iter().copied());
                let candidate = params - step;
                match reprojection_residuals(&object, &image, intrinsics, &candidate) {
                    Ok(candidate_residual) => {
                        let candidate_error = candidate_residual.norm_squared();
                        if candidate_error < error {
                            params = candidate;
                            residual = candidate_residual;
                            error = candidate_error;
                            lambda = (lambda * 0.1).max(1e-12);
                            accepted = true;
                            if step.norm() < PNP_STEP_EPSILON {
                                return pose_from_params(&params);
                            }
                            break;
                        }
                        lambda *= 10.0;
                    }
                    Err(_) => lambda *= 10.0,
                }
            }
            if !accepted {
                break;
            }
        }

        pose_from_params(&params)
    }

    /// Rigid Kabsch alignment of the canonical model onto measured metric
    /// landmarks.
    fn solve_procrustes(&self, landmarks: &LandmarkSet, perspective_factor: f64) -> Result<Pose> {
        let (object, measured) = self.fit_points(landmarks)?;
        let target: Vec<Vector3<f64>> = measured
            .iter()
            .map(|p| Vector3::new(p.x, p.y, p.z * perspective_factor))
            .collect();

        if target.iter().map(|p| p.z.abs()).sum::<f64>() < EPSILON {
            return Err(Error::Pose(
                "Procrustes alignment requires 3-D landmarks with depth".to_string(),
            ));
        }

        let n = object.len() as f64;
        let src_centroid = object.iter().sum::<Vector3<f64>>() / n;
        let dst_centroid = target.iter().sum::<Vector3<f64>>() / n;

        let mut covariance = Matrix3::zeros();
        for (src, dst) in object.iter().zip(&target) {
            covariance += (src - src_centroid) * (dst - dst_centroid).transpose();
        }

        let rotation = nearest_rotation_from_covariance(&covariance)?;
        let translation = dst_centroid - rotation * src_centroid;

        Ok(Pose::new(
            Rotation3::from_matrix_unchecked(rotation).scaled_axis(),
            translation,
        ))
    }
}

/// Project one model point through (rvec, tvec) into pixels.
fn project_point(
    object: &Vector3<f64>,
    intrinsics: CameraIntrinsics,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> Result<Vector2<f64>> {
    let camera = rotation * object + translation;
    if camera.z < EPSILON {
        return Err(Error::Pose("Model point behind the camera".to_string()));
    }
    Ok(Vector2::new(
        intrinsics.focal_x * camera.x / camera.z + intrinsics.principal_x,
        intrinsics.focal_y * camera.y / camera.z + intrinsics.principal_y,
    ))
}

/// Stacked reprojection residuals (projected - observed), 2 per point.
fn reprojection_residuals(
    object: &[Vector3<f64>],
    image: &[Vector2<f64>],
    intrinsics: CameraIntrinsics,
    params: &Vector6<f64>,
) -> Result<DVector<f64>> {
    let rotation = Rotation3::new(Vector3::new(params[0], params[1], params[2]));
    let translation = Vector3::new(params[3], params[4], params[5]);
    let mut residual = DVector::zeros(2 * object.len());
    for (i, (obj, img)) in object.iter().zip(image).enumerate() {
        let projected = project_point(obj, intrinsics, &rotation, &translation)?;
        residual[2 * i] = projected.x - img.x;
        residual[2 * i + 1] = projected.y - img.y;
    }
    Ok(residual)
}

/// Central-difference Jacobian of the residual vector over the 6 params.
fn numeric_jacobian(
    object: &[Vector3<f64>],
    image: &[Vector2<f64>],
    intrinsics: CameraIntrinsics,
    params: &Vector6<f64>,
) -> Result<DMatrix<f64>> {
    const H: f64 = 1e-6;
    let mut jacobian = DMatrix::zeros(2 * object.len(), 6);
    for k in 0..6 {
        let mut plus = *params;
        let mut minus = *params;
        plus[k] += H;
        minus[k] -= H;
        let r_plus = reprojection_residuals(object, image, intrinsics, &plus)?;
        let r_minus = reprojection_residuals(object, image, intrinsics, &minus)?;
        for row in 0..jacobian.nrows() {
            jacobian[(row, k)] = (r_plus[row] - r_minus[row]) / (2.0 * H);
        }
    }
    Ok(jacobian)
}

fn pose_from_params(params: &Vector6<f64>) -> Result<Pose> {
    let pose = Pose::new(
        Vector3::new(params[0], params[1], params[2]),
        Vector3::new(params[3], params[4], params[5]),
    );
    if !pose.is_finite() {
        return Err(Error::Pose("PnP solver produced a non-finite pose".to_string()));
    }
    Ok(pose)
}

/// Closed-form scaled-orthographic (POS) pose seed.
fn pos_seed(object: &[Vector3<f64>], image: &[Vector2<f64>], intrinsics: CameraIntrinsics) -> Result<Vector6<f64>> {
    let n = object.len();
    let nf = n as f64;

    let centroid = object.iter().sum::<Vector3<f64>>() / nf;
    let mut centered = DMatrix::zeros(n, 3);
    for (i, obj) in object.iter().enumerate() {
        let d = obj - centroid;
        centered[(i, 0)] = d.x;
        centered[(i, 1)] = d.y;
        centered[(i, 2)] = d.z;
    }
    let pinv = centered
        .pseudo_inverse(1e-10)
        .map_err(|e| Error::Pose(format!("Degenerate model matrix in POS seed: {e}")))?;

    // Focal-normalized, centered image coordinates
    let mut x_img = DVector::zeros(n);
    let mut y_img = DVector::zeros(n);
    for (i, img) in image.iter().enumerate() {
        x_img[i] = (img.x - intrinsics.principal_x) / intrinsics.focal_x;
        y_img[i] = (img.y - intrinsics.principal_y) / intrinsics.focal_y;
    }
    let x_mean = x_img.mean();
    let y_mean = y_img.mean();
    x_img.add_scalar_mut(-x_mean);
    y_img.add_scalar_mut(-y_mean);

    let i_vec = &pinv * &x_img;
    let j_vec = &pinv * &y_img;
    let i_vec = Vector3::new(i_vec[0], i_vec[1], i_vec[2]);
    let j_vec = Vector3::new(j_vec[0], j_vec[1], j_vec[2]);

    let s1 = i_vec.norm();
    let s2 = j_vec.norm();
    let scale = (s1 + s2) / 2.0;
    if scale < EPSILON || s1 < EPSILON || s2 < EPSILON {
        return Err(Error::Pose("Degenerate scale in POS seed".to_string()));
    }

    let r1 = i_vec / s1;
    let r2 = j_vec / s2;
    let r3 = r1.cross(&r2);
    let raw = Matrix3::new(
        r1.x, r1.y, r1.z, //
        r2.x, r2.y, r2.z, //
        r3.x, r3.y, r3.z,
    );
    let rotation = nearest_rotation(&raw)?;

    // POS places the model centroid; shift to the model-frame origin used by
    // the projection (R * X + t).
    let tz = 1.0 / scale;
    let translation = Vector3::new(x_mean * tz, y_mean * tz, tz) - rotation * centroid;

    let axis_angle = Rotation3::from_matrix_unchecked(rotation).scaled_axis();
    Ok(Vector6::new(
        axis_angle.x,
        axis_angle.y,
        axis_angle.z,
        translation.x,
        translation.y,
        translation.z,
    ))
}

/// Nearest rotation matrix (Frobenius) to an approximately-orthogonal matrix.
fn nearest_rotation(raw: &Matrix3<f64>) -> Result<Matrix3<f64>> {
    let svd = raw.svd(true, true);
    let u = svd.u.ok_or_else(|| Error::Pose("SVD failed".to_string()))?;
    let v_t = svd.v_t.ok_or_else(|| Error::Pose("SVD failed".to_string()))?;
    let mut rotation = u * v_t;
    if rotation.determinant() < 0.0 {
        let flipped = u * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0)) * v_t;
        rotation = flipped;
    }
    Ok(rotation)
}

/// Kabsch rotation from a cross-covariance matrix (src against dst).
fn nearest_rotation_from_covariance(covariance: &Matrix3<f64>) -> Result<Matrix3<f64>> {
    let svd = covariance.svd(true, true);
    let u = svd.u.ok_or_else(|| Error::Pose("SVD failed".to_string()))?;
    let v_t = svd.v_t.ok_or_else(|| Error::Pose("SVD failed".to_string()))?;
    let v = v_t.transpose();
    let d = (v * u.transpose()).determinant();
    let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, if d < 0.0 { -1.0 } else { 1.0 }));
    Ok(v * correction * u.transpose())
}
