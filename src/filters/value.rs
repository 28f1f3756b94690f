use super::Kalman1D;
use nalgebra::{Complex, Vector2};

/// A scalar value smoothed by an optional [`Kalman1D`].
///
/// With no filter configured (or strength <= 0) `set` is the identity and no
/// estimator state advances. Reconfiguring the strength replaces the filter
/// instance, discarding prior uncertainty state; the measurement noise is
/// the square of the configured strength.
#[derive(Debug, Clone)]
pub struct FilteredValue {
    filter: Option<Kalman1D>,
    value: f64,
}

impl FilteredValue {
    /// Create with an initial value and no filtering.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self { filter: None, value }
    }

    /// Create with an initial value and filter strength.
    #[must_use]
    pub fn with_strength(value: f64, strength: f64) -> Self {
        let mut v = Self::new(value);
        v.set_filter_strength(strength);
        v
    }

    /// Feed a raw value, returning the filtered value.
    pub fn set(&mut self, raw: f64) -> f64 {
        self.value = match &mut self.filter {
            Some(filter) => filter.update_real(raw),
            None => raw,
        };
        self.value
    }

    /// Last filtered value
    #[must_use]
    pub fn get(&self) -> f64 {
        self.value
    }

    /// Reconfigure the filter strength; <= 0 disables filtering.
    ///
    /// Always starts from a fresh filter instance so no uncertainty bleeds
    /// over from the previous regime.
    pub fn set_filter_strength(&mut self, strength: f64) {
        self.filter = (strength > 0.0).then(|| Kalman1D::new(strength * strength));
    }

    /// Whether a filter is currently active
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }
}

/// A planar value smoothed by one [`Kalman1D`] over a complex scalar.
///
/// Same contract as [`FilteredValue`]; the x axis rides the real part and
/// the y axis the imaginary part, so both axes share the filter's gain and
/// uncertainty evolution.
#[derive(Debug, Clone)]
pub struct FilteredPoint {
    filter: Option<Kalman1D>,
    value: Vector2<f64>,
}

impl FilteredPoint {
    /// Create with an initial value and no filtering.
    #[must_use]
    pub fn new(value: Vector2<f64>) -> Self {
        Self { filter: None, value }
    }

    /// Create with an initial value and filter strength.
    #[must_use]
    pub fn with_strength(value: Vector2<f64>, strength: f64) -> Self {
        let mut v = Self::new(value);
        v.set_filter_strength(strength);
        v
    }

    /// Feed a raw point, returning the filtered point.
    pub fn set(&mut self, raw: Vector2<f64>) -> Vector2<f64> {
        self.value = match &mut self.filter {
            Some(filter) => {
                let estimate = filter.update(Complex::new(raw.x, raw.y));
                Vector2::new(estimate.re, estimate.im)
            }
            None => raw,
        };
        self.value
    }

    /// Last filtered point
    #[must_use]
    pub fn get(&self) -> Vector2<f64> {
        self.value
    }

    /// Reconfigure the filter strength; <= 0 disables filtering.
    pub fn set_filter_strength(&mut self, strength: f64) {
        self.filter = (strength > 0.0).then(|| Kalman1D::new(strength * strength));
    }

    /// Whether a filter is currently active
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unfiltered_is_identity() {
        let mut value = FilteredValue::new(0.0);
        for raw in [1.0, -3.5, 42.0, f64::MAX] {
            assert_eq!(value.set(raw), raw);
            assert_eq!(value.get(), raw);
        }
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let mut value = FilteredValue::with_strength(0.0, 0.0);
        assert!(!value.is_filtered());
        assert_eq!(value.set(7.0), 7.0);
    }

    #[test]
    fn test_filtered_lags_input() {
        let mut value = FilteredValue::with_strength(0.0, 1.0);
        value.set(0.0);
        let stepped = value.set(10.0);
        assert!(stepped > 0.0 && stepped < 10.0);
    }

    #[test]
    fn test_reconfigure_resets_state() {
        let mut value = FilteredValue::with_strength(0.0, 0.5);
        for _ in 0..100 {
            value.set(8.0);
        }
        // A fresh filter restarts from its zero estimate; the first output
        // after reseeding must not continue from the old estimate.
        value.set_filter_strength(0.5);
        let first = value.set(8.0);
        let mut fresh = FilteredValue::with_strength(0.0, 0.5);
        assert_eq!(first, fresh.set(8.0));
    }

    #[test]
    fn test_point_converges() {
        let mut point = FilteredPoint::with_strength(Vector2::zeros(), 0.1);
        let mut out = Vector2::zeros();
        for _ in 0..500 {
            out = point.set(Vector2::new(2.0, -4.0));
        }
        assert!((out.x - 2.0).abs() < 1e-3);
        assert!((out.y + 4.0).abs() < 1e-3);
    }

    #[test]
    fn test_point_disable_reenable() {
        let mut point = FilteredPoint::with_strength(Vector2::zeros(), 0.1);
        point.set(Vector2::new(1.0, 1.0));
        point.set_filter_strength(-1.0);
        assert!(!point.is_filtered());
        let raw = Vector2::new(9.0, 9.0);
        assert_eq!(point.set(raw), raw);
    }
}
