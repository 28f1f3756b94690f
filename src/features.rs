//! Projective-invariant geometric measures over a landmark set.
//!
//! Every function here is a pure function of the landmark positions. The
//! generic extractors take explicit index lists and reject wrong arity
//! instead of truncating; the named facial measures (jaw-open, mouth-pucker,
//! brow-raise, smile) apply them to fixed face-mesh index tuples.
//!
//! Euclidean-ratio measures divide a moving distance by a normalizing
//! distance (head height), making them invariant to face scale and camera
//! distance. Cross-ratio measures are invariant under any projective
//! transform of the image plane, so they survive perspective as well.

use crate::{
    constants::{
        EPSILON, LM_CHIN, LM_CHIN_BOTTOM, LM_CROWN, LM_FOREHEAD, LM_GLABELLA, LM_LEFT_EYE_OUTER,
        LM_LEFT_MOUTH_CORNER, LM_MOUTH_LOWER, LM_MOUTH_UPPER, LM_NOSE_BRIDGE, LM_NOSE_TIP,
        LM_RIGHT_EYE_OUTER, LM_RIGHT_MOUTH_CORNER,
    },
    landmarks::LandmarkSet,
    Error, Result,
};
use nalgebra::{Matrix3, Point2};

fn require_arity(indices: &[usize], expected: usize, what: &str) -> Result<()> {
    if indices.len() == expected {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "{what} requires exactly {expected} landmark indices, got {}",
            indices.len()
        )))
    }
}

fn distance(landmarks: &LandmarkSet, a: usize, b: usize) -> Result<f64> {
    Ok((landmarks.point2(a)? - landmarks.point2(b)?).norm())
}

/// Determinant of three homogeneous image points (x, y, 1).
fn det3(p1: Point2<f64>, p2: Point2<f64>, p3: Point2<f64>) -> f64 {
    Matrix3::new(
        p1.x, p1.y, 1.0, //
        p2.x, p2.y, 1.0, //
        p3.x, p3.y, 1.0,
    )
    .determinant()
}

/// Ratio of two Euclidean distances: |i0 - i1| / |i2 - i3|.
///
/// # Errors
///
/// Rejects index lists that are not exactly 4 long, out-of-range indices,
/// and a degenerate (near-zero) normalizing distance.
pub fn euclidean_ratio(landmarks: &LandmarkSet, indices: &[usize]) -> Result<f64> {
    require_arity(indices, 4, "euclidean_ratio")?;
    let numerator = distance(landmarks, indices[0], indices[1])?;
    let denominator = distance(landmarks, indices[2], indices[3])?;
    if denominator < EPSILON {
        return Err(Error::InvalidInput(
            "Degenerate normalizing distance in euclidean_ratio".to_string(),
        ));
    }
    Ok(numerator / denominator)
}

/// Four-point cross-ratio of near-colinear points:
/// (|P3-P1| * |P4-P2|) / (|P4-P1| * |P3-P2|).
///
/// # Errors
///
/// Rejects index lists that are not exactly 4 long, out-of-range indices,
/// and coincident points that zero the denominator.
pub fn cross_ratio(landmarks: &LandmarkSet, indices: &[usize]) -> Result<f64> {
    require_arity(indices, 4, "cross_ratio")?;
    let d31 = distance(landmarks, indices[2], indices[0])?;
    let d42 = distance(landmarks, indices[3], indices[1])?;
    let d41 = distance(landmarks, indices[3], indices[0])?;
    let d32 = distance(landmarks, indices[2], indices[1])?;
    let denominator = d41 * d32;
    if denominator < EPSILON {
        return Err(Error::InvalidInput("Degenerate cross_ratio denominator".to_string()));
    }
    Ok((d31 * d42) / denominator)
}

/// Five-point cross-ratio of coplanar points, formed from four 3x3
/// determinants of homogeneous point triples:
/// D(1,2,4) * D(1,3,5) / (D(1,2,5) * D(1,3,4)).
///
/// # Errors
///
/// Rejects index lists that are not exactly 5 long, out-of-range indices,
/// and colinear triples that zero the denominator.
pub fn cross_ratio5(landmarks: &LandmarkSet, indices: &[usize]) -> Result<f64> {
    require_arity(indices, 5, "cross_ratio5")?;
    let p: Vec<Point2<f64>> = indices
        .iter()
        .map(|&i| landmarks.point2(i))
        .collect::<Result<_>>()?;
    let d124 = det3(p[0], p[1], p[3]);
    let d135 = det3(p[0], p[2], p[4]);
    let d125 = det3(p[0], p[1], p[4]);
    let d134 = det3(p[0], p[2], p[3]);
    let denominator = d125 * d134;
    if denominator.abs() < EPSILON {
        return Err(Error::InvalidInput("Degenerate cross_ratio5 denominator".to_string()));
    }
    Ok((d124 * d135) / denominator)
}

/// Quotient of two five-point cross-ratios sharing the first four points and
/// differing in the fifth: indices are [s1, s2, s3, s4, fifth_a, fifth_b].
///
/// # Errors
///
/// Rejects index lists that are not exactly 6 long; otherwise the same
/// conditions as [`cross_ratio5`].
pub fn cross_cross_ratio(landmarks: &LandmarkSet, indices: &[usize]) -> Result<f64> {
    require_arity(indices, 6, "cross_cross_ratio")?;
    let shared = &indices[..4];
    let with_a = [shared[0], shared[1], shared[2], shared[3], indices[4]];
    let with_b = [shared[0], shared[1], shared[2], shared[3], indices[5]];
    let cr_a = cross_ratio5(landmarks, &with_a)?;
    let cr_b = cross_ratio5(landmarks, &with_b)?;
    if cr_b.abs() < EPSILON {
        return Err(Error::InvalidInput(
            "Degenerate cross_cross_ratio denominator".to_string(),
        ));
    }
    Ok(cr_a / cr_b)
}

/// Jaw opening: nose-to-chin distance normalized by head height.
pub fn jaw_open(landmarks: &LandmarkSet) -> Result<f64> {
    euclidean_ratio(landmarks, &[LM_NOSE_TIP, LM_CHIN, LM_CROWN, LM_FOREHEAD])
}

/// Mouth pucker: upper/lower lip reference distance normalized by head height.
pub fn mouth_pucker(landmarks: &LandmarkSet) -> Result<f64> {
    euclidean_ratio(landmarks, &[LM_MOUTH_UPPER, LM_MOUTH_LOWER, LM_FOREHEAD, LM_CROWN])
}

/// Brow raise: four-point cross-ratio down the face midline. The glabella
/// point rides the brows; the crown, nose bridge and nose tip anchor it.
pub fn brow_raise(landmarks: &LandmarkSet) -> Result<f64> {
    cross_ratio(landmarks, &[LM_CROWN, LM_GLABELLA, LM_NOSE_BRIDGE, LM_NOSE_TIP])
}

/// Smile: average of the left and right mouth-corner cross-cross-ratios
/// against the rigid eye/nose/chin frame.
pub fn smile(landmarks: &LandmarkSet) -> Result<f64> {
    let shared = [LM_LEFT_EYE_OUTER, LM_RIGHT_EYE_OUTER, LM_NOSE_TIP, LM_CHIN_BOTTOM];
    let left = cross_cross_ratio(
        landmarks,
        &[shared[0], shared[1], shared[2], shared[3], LM_LEFT_MOUTH_CORNER, LM_NOSE_BRIDGE],
    )?;
    let right = cross_cross_ratio(
        landmarks,
        &[shared[0], shared[1], shared[2], shared[3], LM_RIGHT_MOUTH_CORNER, LM_NOSE_BRIDGE],
    )?;
    Ok((left + right) / 2.0)
}
