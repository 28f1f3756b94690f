use crate::constants::{KALMAN_INITIAL_UNCERTAINTY, KALMAN_PROCESS_NOISE};
use nalgebra::Complex;

/// Recursive one-dimensional Kalman estimator over a complex scalar.
///
/// Tracks a single value with a scalar uncertainty. Each update predicts
/// (uncertainty grows by the fixed process noise), computes the gain against
/// the configured measurement noise `R`, and corrects the estimate toward
/// the new measurement. Larger `R` means stronger smoothing and slower
/// response.
///
/// Real-valued signals use a zero imaginary part; planar signals pack
/// (x, y) into (re, im) so both axes share one gain/uncertainty evolution.
#[derive(Debug, Clone)]
pub struct Kalman1D {
    // Measurement noise
    r: f64,
    // Process noise
    q: f64,
    // Running estimate
    xhat: Complex<f64>,
    // Estimate uncertainty
    p: f64,
}

impl Kalman1D {
    /// Create a filter with measurement noise `r`.
    #[must_use]
    pub fn new(r: f64) -> Self {
        Self {
            r,
            q: KALMAN_PROCESS_NOISE,
            xhat: Complex::new(0.0, 0.0),
            p: KALMAN_INITIAL_UNCERTAINTY,
        }
    }

    /// Feed a new measurement and return the updated estimate.
    pub fn update(&mut self, measurement: Complex<f64>) -> Complex<f64> {
        // Predict
        let p_minus = self.p + self.q;

        // Correct
        let gain = p_minus / (p_minus + self.r);
        self.xhat += (measurement - self.xhat) * gain;
        self.p = (1.0 - gain) * p_minus;

        self.xhat
    }

    /// Feed a real-valued measurement and return the real part of the estimate.
    pub fn update_real(&mut self, measurement: f64) -> f64 {
        self.update(Complex::new(measurement, 0.0)).re
    }

    /// Configured measurement noise
    #[must_use]
    pub fn measurement_noise(&self) -> f64 {
        self.r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_converges_to_constant() {
        let mut filter = Kalman1D::new(0.01);
        let mut value = 0.0;
        for _ in 0..500 {
            value = filter.update_real(5.0);
        }
        assert!((value - 5.0).abs() < 1e-3, "converged to {value}");
    }

    #[test]
    fn test_smooths_step() {
        let mut filter = Kalman1D::new(1.0);
        filter.update_real(0.0);
        // A step input is not followed immediately with large R
        let first_after_step = filter.update_real(10.0);
        assert!(first_after_step < 10.0);
        assert!(first_after_step > 0.0);
    }

    #[test]
    fn test_planar_components_track_together() {
        let mut filter = Kalman1D::new(0.01);
        let mut out = Complex::new(0.0, 0.0);
        for _ in 0..500 {
            out = filter.update(Complex::new(3.0, -7.0));
        }
        assert!((out.re - 3.0).abs() < 1e-3);
        assert!((out.im + 7.0).abs() < 1e-3);
    }

    #[test]
    fn test_stronger_noise_is_slower() {
        let mut weak = Kalman1D::new(0.001);
        let mut strong = Kalman1D::new(1.0);
        weak.update_real(0.0);
        strong.update_real(0.0);
        let weak_step = weak.update_real(1.0);
        let strong_step = strong.update_real(1.0);
        assert!(weak_step > strong_step);
    }
}
