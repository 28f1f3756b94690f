//! Signal smoothing for noisy per-frame measurements.
//!
//! One recursive scalar estimator ([`kalman::Kalman1D`]) smooths both real
//! and planar quantities; planar values travel through the recursion as a
//! single complex number so one filter instance covers both axes.

/// Recursive one-dimensional Kalman estimator
pub mod kalman;

/// Stateful filtered-value wrappers used by signals and the pipeline
pub mod value;

pub use kalman::Kalman1D;
pub use value::{FilteredPoint, FilteredValue};
